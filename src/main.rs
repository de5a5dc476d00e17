use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    soulflow_cli::cli::app::run().await
}
