use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    env_logger::init();
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let username = std::env::var("MOCK_USER").unwrap_or_else(|_| "user".to_string());
    let password = std::env::var("MOCK_PASSWORD").unwrap_or_else(|_| "pass".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    log::info!("listening on http://{addr}/v1 as {username}");
    mock_server::run_with(listener, mock_server::new_db(&username, &password)).await
}
