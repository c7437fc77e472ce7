use clap::Parser;
use tracing_subscriber::EnvFilter;

use approval_notifier_lib::cli::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = approval_notifier_lib::run(cli).await {
        if json {
            match serde_json::to_string(&err) {
                Ok(payload) => eprintln!("{}", payload),
                Err(_) => eprintln!("{}", err),
            }
        } else {
            eprintln!("error: {}", err);
        }
        std::process::exit(1);
    }
}
