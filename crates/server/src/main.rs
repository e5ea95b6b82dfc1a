use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dealerbot_server::run().await
}
