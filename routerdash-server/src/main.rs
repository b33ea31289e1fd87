#[tokio::main]
async fn main() -> anyhow::Result<()> {
    routerdash_server::run().await
}
