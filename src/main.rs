#[tokio::main]
async fn main() -> anyhow::Result<()> {
    framesentry_lib::run().await
}
