//! Replicant Client Binary
//!
//! Usage: replicant-client [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Path to configuration file
//!   -t, --test <FILE>    Test connection to server
//!   -h, --help           Print help information

use std::env;
use std::time::Duration;

use replicant::client::{Client, ClientConfig, ClientConfigFile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "-h" | "--help" => {
            print_usage();
        }
        "-t" | "--test" => {
            if args.len() < 3 {
                eprintln!("Error: --test requires a config file path");
                return Ok(());
            }
            test_connection(&args[2]).await?;
        }
        "-c" | "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                return Ok(());
            }
            run_client(&args[2]).await?;
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"Replicant Client - local tunnel over a Replicant connection

USAGE:
    replicant-client [OPTIONS]

OPTIONS:
    -c, --config <FILE>  Path to configuration file
    -t, --test <FILE>    Test connection using config file
    -h, --help           Print help information

CONFIGURATION FILE FORMAT (JSON):
    {{
        "listen_addr": "127.0.0.1:1080",
        "server_addr": "server.example.com:2277",
        "replicant": "<encoded client config from replicant-server --generate>"
    }}

EXAMPLES:
    Test connection:
        replicant-client --test client.json

    Run the tunnel:
        replicant-client --config client.json
"#
    );
}

async fn test_connection(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!("Testing connection to {}", config.server_addr);

    match config.replicant.dial(&config.server_addr).await {
        Ok(mut conn) => {
            tracing::info!(
                "Handshake complete (polish: {}), local {}",
                conn.is_polished(),
                conn.local_addr()?
            );

            conn.write(b"Hello, Replicant!").await?;
            tracing::info!("Sent test message");

            let mut buf = vec![0u8; 4096];
            match tokio::time::timeout(Duration::from_secs(5), conn.read(&mut buf)).await {
                Ok(Ok(n)) => {
                    tracing::info!("Received response: {} bytes", n);
                }
                Ok(Err(e)) => {
                    tracing::warn!("Receive error: {}", e);
                }
                Err(_) => {
                    tracing::info!("No response within timeout (this may be normal)");
                }
            }

            conn.close().await?;
            tracing::info!("Connection closed successfully");
        }
        Err(e) => {
            tracing::error!("Connection failed: {}", e);
        }
    }

    Ok(())
}

async fn run_client(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let client = Client::new(config)?;
    client.run().await?;
    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<ClientConfig> {
    let content = std::fs::read_to_string(path)?;
    let config_file: ClientConfigFile = serde_json::from_str(&content)?;
    let config = config_file.to_config()?;
    config.validate()?;
    Ok(config)
}
