use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal client for the memory match server", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Join immediately under this name
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Theme to request when joining an empty game
    #[arg(short = 't', long)]
    theme: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let mut client = Client::new(&args.server, args.name, args.theme).await?;

    client.run().await?;

    Ok(())
}
