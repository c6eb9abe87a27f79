use clap::Parser;
use leikki_client::{Cli, run};

#[tokio::main]
async fn main() -> Result<(), leikki_client::AppError> {
    run(Cli::parse()).await
}
