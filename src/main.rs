#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wayfinder_cli::cli::run().await
}
