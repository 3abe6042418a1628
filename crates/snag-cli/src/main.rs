mod cli;

#[tokio::main]
async fn main() {
    if let Err(err) = cli::run().await {
        eprintln!("snag: {:#}", err);
        std::process::exit(1);
    }
}
