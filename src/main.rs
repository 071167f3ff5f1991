use clap::Parser;
use netdelay::cli::{self, Args};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = cli::run(args).await {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
