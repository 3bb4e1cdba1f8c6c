use std::process::exit;

#[tokio::main]
async fn main() {
    exit(webenum::app::run().await)
}
