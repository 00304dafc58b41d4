#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = classhub::run().await {
        eprintln!("classhub fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
