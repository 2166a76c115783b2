#[tokio::main]
async fn main() {
    if let Err(e) = ocr_studio_lib::run().await {
        eprintln!("ocr-studio: {e}");
        std::process::exit(1);
    }
}
