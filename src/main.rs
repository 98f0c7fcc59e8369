//! elohim-chain: command line access to an agent's source chain
//!
//! Opens the SQLite chain in the data directory (running genesis on first
//! use) and performs one operation against it.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use elohim_chain::action::{Action, CommitAction, GetOptions, GetReq};
use elohim_chain::chain::SqliteChainStore;
use elohim_chain::config::Config;
use elohim_chain::dht::GetMask;
use elohim_chain::entry::Entry;
use elohim_chain::hash::Hash;
use elohim_chain::signing::{verify_signature, Agent, PRIVATE_KEY_LEN};
use elohim_chain::HostBuilder;

#[derive(Parser)]
#[command(name = "elohim-chain")]
#[command(about = "Source chain validation and DHT replication core for Elohim agents")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "elohim-chain.toml")]
    config: String,

    /// Data directory (overrides config file)
    #[arg(short, long, env = "ELOHIM_CHAIN_DATA_DIR")]
    data_dir: Option<String>,

    /// Agent identity (overrides config file)
    #[arg(long, env = "ELOHIM_CHAIN_IDENTITY")]
    identity: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the agent's public key and node id, generating a key if needed
    Keygen,
    /// Commit an entry to the chain
    Commit {
        entry_type: String,
        entry: String,
    },
    /// Read an entry from the local chain by hash
    Get { hash: String },
    /// Sign data with the agent key
    Sign { data: String },
    /// Verify a base58 signature against a base58 public key
    Verify {
        signature: String,
        data: String,
        pub_key: String,
    },
    /// Validate an entry without committing it
    Validate {
        entry_type: String,
        entry: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("elohim_chain=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config_path = PathBuf::from(&cli.config);
    let mut config = Config::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    // Apply CLI overrides
    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = PathBuf::from(data_dir);
    }
    if let Some(identity) = cli.identity {
        config.node.identity = identity;
    }

    let data_dir = config.node.data_dir.clone();
    let agent = load_or_generate_agent(&data_dir, &config.node.identity)?;

    // Commands that never touch the chain
    match &cli.command {
        Command::Keygen => {
            println!("public key: {}", agent.encode_pub_key());
            println!("node id:    {}", agent.node_id());
            return Ok(());
        }
        Command::Verify {
            signature,
            data,
            pub_key,
        } => {
            let ok = verify_signature(signature, data.as_bytes(), pub_key)?;
            println!("{}", ok);
            return Ok(());
        }
        Command::Sign { data } => {
            println!("{}", agent.sign_b58(data.as_bytes()));
            return Ok(());
        }
        _ => {}
    }

    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let hash_spec = config.hash_spec()?;
    let store = SqliteChainStore::open(&data_dir, hash_spec)?;
    let host = HostBuilder::from_config(agent, &config, &base_dir)?
        .store(Box::new(store))
        .build()
        .await?;

    info!(data_dir = %data_dir.display(), "Chain opened");

    match cli.command {
        Command::Commit { entry_type, entry } => {
            let hash = host.commit(&entry_type, Entry::text(entry)).await?;
            println!("{}", hash);
        }
        Command::Get { hash } => {
            let req = GetReq::new(Hash::from_b58(&hash)?).with_get_mask(GetMask::ALL);
            let resp = host.get(req, GetOptions::local()).await?;
            println!("{}", serde_json::to_string_pretty(&resp.to_value())?);
        }
        Command::Validate { entry_type, entry } => {
            let action = Action::Commit(CommitAction::new(&entry_type, Entry::text(entry)));
            match host.validate_action(&action, &entry_type, None, &[host.node_id().clone()]) {
                Ok(_) => println!("{}", json!({"valid": true})),
                Err(e) => {
                    println!("{}", json!({"valid": false, "error": e.to_string()}));
                    std::process::exit(1);
                }
            }
        }
        Command::Keygen | Command::Sign { .. } | Command::Verify { .. } => {}
    }

    Ok(())
}

/// Load the agent seed from `data_dir/agent_key`, generating and saving a
/// new one on first run.
fn load_or_generate_agent(data_dir: &Path, identity: &str) -> anyhow::Result<Agent> {
    let key_path = data_dir.join("agent_key");

    if key_path.exists() {
        let bytes = std::fs::read(&key_path)?;
        let seed: [u8; PRIVATE_KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow::anyhow!("agent key at {} is corrupt", key_path.display()))?;
        Ok(Agent::from_seed(identity, seed))
    } else {
        let agent = Agent::generate(identity);
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(&key_path, agent.to_seed())?;
        info!(path = %key_path.display(), "Generated new agent key");
        Ok(agent)
    }
}
