#[tokio::main]
async fn main() -> anyhow::Result<()> {
    foodie_map_lib::run().await
}
