use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    docdex::cli::run().await
}
