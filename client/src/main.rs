mod cli;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("client=info,common=info,reqwest=warn")
        .init();

    cli::run().await
}
