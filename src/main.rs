#[tokio::main]
async fn main() -> anyhow::Result<()> {
    event_embed_lib::run().await
}
