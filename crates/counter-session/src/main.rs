//! counterctl: terminal front-end for the counter session.
//!
//! Connects (auto-connect, as a page would on load), runs one action and
//! prints the reconciled session view.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use counter_session::prelude::*;

/// Counter dApp session client
#[derive(Parser, Debug)]
#[command(name = "counterctl")]
#[command(about = "Connect a wallet to the counter contract and run one action", version)]
struct Args {
    /// TOML configuration file (defaults to COUNTER_* environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint of a node with unlocked accounts
    #[arg(long)]
    rpc_url: Option<String>,

    /// Counter contract address
    #[arg(long)]
    contract: Option<String>,

    /// Run against an in-memory chain (no node required)
    #[arg(long)]
    demo: bool,

    /// In demo mode, connect with the owner's account
    #[arg(long, requires = "demo")]
    as_owner: bool,

    #[command(subcommand)]
    command: Option<Action>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Show owner, wallet and counter
    Status,
    /// Call incrementCounter()
    Increment,
    /// Call decrementCounter()
    Decrement,
    /// Call resetCounter() (owner only)
    Reset,
}

fn load_config(args: &Args) -> anyhow::Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SessionConfig::from_env().context("reading COUNTER_* environment")?,
    };
    if let Some(url) = &args.rpc_url {
        config.rpc_url.clone_from(url);
    }
    if let Some(contract) = &args.contract {
        config.contract_address = Some(contract.clone());
    }
    Ok(config)
}

fn node_session(config: &SessionConfig) -> anyhow::Result<CounterSession> {
    let provider = HttpProvider::new(config.rpc_url.clone(), config.request_timeout())
        .context("building HTTP provider")?;
    tracing::info!(rpc_url = %provider.url(), "using node provider");
    CounterSession::from_config(config, Some(Arc::new(provider))).context("invalid configuration")
}

fn demo_session(config: &SessionConfig, as_owner: bool) -> anyhow::Result<CounterSession> {
    let user = Address::new([0xA1; 20]);
    let owner = Address::new([0xB2; 20]);
    let accounts = if as_owner {
        vec![owner, user]
    } else {
        vec![user, owner]
    };

    let chain = Arc::new(InMemoryChain::new(31337, accounts));
    let contract = chain.deploy_counter(owner);
    chain.set_counter(contract, U256::from(5u64));
    tracing::info!(contract = %contract, owner = %owner, "demo chain ready");

    let mut settings = SessionSettings::new(contract);
    settings.executor = config.executor_settings();
    Ok(CounterSession::new(
        settings,
        config.load_abi()?,
        Some(chain as Arc<dyn Eip1193Provider>),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(&TelemetryConfig::from_env())?;

    let config = load_config(&args)?;
    let session = Arc::new(if args.demo {
        demo_session(&config, args.as_owner)?
    } else {
        node_session(&config)?
    });

    let connected = session.start().await;

    let outcome = match args.command.unwrap_or(Action::Status) {
        Action::Status => connected.map(|_| ()),
        Action::Increment => session.increment().await.map(|_| ()),
        Action::Decrement => session.decrement().await.map(|_| ()),
        Action::Reset => session.reset().await.map(|_| ()),
    };

    print!("{}", session.view().await);

    Ok(match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_recoverable() => ExitCode::from(1),
        Err(_) => ExitCode::from(2),
    })
}
