//! Replicant Server Binary
//!
//! Usage: replicant-server [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Path to configuration file
//!   -g, --generate       Generate new server configuration
//!   -h, --help           Print help information

use std::env;

use sha2::{Digest, Sha256};

use replicant::polish::PolishServerConfig;
use replicant::server::{Server, ServerConfig, ServerConfigFile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Respects RUST_LOG (e.g. RUST_LOG=replicant=debug)
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
        "-g" | "--generate" => {
            let forward = args.get(2).map(String::as_str).unwrap_or("127.0.0.1:8080");
            generate_config(forward)?;
        }
        "-c" | "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                return Ok(());
            }
            run_server(&args[2]).await?;
        }
        "--show-client" => {
            if args.len() < 3 {
                eprintln!("Error: --show-client requires a config file path");
                return Ok(());
            }
            show_client(&args[2])?;
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
        r#"Replicant Server - obfuscating forwarding server

USAGE:
    replicant-server [OPTIONS]

OPTIONS:
    -c, --config <FILE>          Path to configuration file
    -g, --generate [FORWARD]     Generate new server configuration
    --show-client <FILE>         Print the client config for an existing server config
    -h, --help                   Print help information

EXAMPLES:
    Generate a new configuration:
        replicant-server --generate 127.0.0.1:8080 > server.toml

    Run the server:
        replicant-server --config server.toml
"#
    );
}

/// Short hex fingerprint of the Silver public key, for matching configs by eye.
fn fingerprint(config: &ServerConfig) -> Option<String> {
    match &config.replicant.polish {
        Some(PolishServerConfig::Silver(silver)) => {
            let digest = Sha256::digest(silver.server_public_key.to_bytes());
            Some(hex::encode(&digest[..8]))
        }
        None => None,
    }
}

fn print_client_info(config: &ServerConfig) -> anyhow::Result<()> {
    let client = config.replicant.client_config(None);
    println!("# Client connection info (put this in client.json as \"replicant\"):");
    println!("# {}", client.encode()?);
    if let Some(fingerprint) = fingerprint(config) {
        println!("# Server key fingerprint: {}", fingerprint);
    }
    Ok(())
}

fn generate_config(forward_addr: &str) -> anyhow::Result<()> {
    let config = ServerConfig::new_random("0.0.0.0", 2277, forward_addr);
    let config_file = ServerConfigFile::from_config(&config)?;

    println!("# Replicant Server Configuration");
    println!("# Generated: {}", chrono::Utc::now());
    println!();
    println!("{}", toml::to_string_pretty(&config_file)?);
    println!();
    print_client_info(&config)
}

fn load_config(config_path: &str) -> anyhow::Result<ServerConfig> {
    let content = std::fs::read_to_string(config_path)?;
    let config_file: ServerConfigFile = toml::from_str(&content)?;
    Ok(config_file.to_config()?)
}

fn show_client(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    print_client_info(&config)
}

async fn run_server(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    tracing::info!("Starting Replicant server on {}:{}", config.listen_addr, config.listen_port);
    tracing::info!("Forwarding to {}", config.forward_addr);
    if let Some(fingerprint) = fingerprint(&config) {
        tracing::info!("Server key fingerprint: {}", fingerprint);
    }

    let server = Server::new(config)?;
    server.run().await?;

    Ok(())
}
