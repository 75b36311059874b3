#[tokio::main]
async fn main() {
    if let Err(e) = gallery_fetch::cli::run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
