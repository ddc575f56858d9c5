use zentral_provider::{init_logging, serve, ZentralProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting zentral provider");
    serve(ZentralProvider::new()).await?;
    Ok(())
}
