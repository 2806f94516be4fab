use clap::builder::RangedU64ValueParser;
use clap::Parser;
use log::info;
use server::network::Server;
use shared::MAX_CLIENTS;

#[derive(Parser, Debug)]
#[command(author, version, about = "Shared memory-match game server", long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Maximum number of simultaneous connections
    #[arg(
        short,
        long,
        default_value = "32",
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_CLIENTS as u64)
    )]
    max_clients: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting memory match server on {}", address);
    let mut server = Server::new(&address, args.max_clients).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
