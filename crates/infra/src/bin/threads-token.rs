//! Command-line access to the Threads token lifecycle.
//!
//! Run with: `threads-token [token|status|logout] [--store <PATH> | --keychain]`
//!
//! This is a CLI tool, so `println!` and `eprintln!` are intentionally used
//! for user-facing output. Diagnostics go through `tracing` on stderr and are
//! controlled with `RUST_LOG`.

#![allow(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use threads_auth_common::auth::{PkceFlowController, TokenStore};
use threads_auth_infra::{config, ConsolePresenter, FileTokenStore, KeychainTokenStore};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Token,
    Status,
    Logout,
}

#[derive(Debug)]
enum StoreChoice {
    File(PathBuf),
    Keychain,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let result = match parse_args(env::args().skip(1)) {
        Ok(Some((task, store))) => run(task, store).await,
        Ok(None) => {
            print_help();
            Ok(())
        }
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            print_help();
            Err(anyhow!("invalid arguments"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("threads-token failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(
    mut args: impl Iterator<Item = String>,
) -> anyhow::Result<Option<(Task, StoreChoice)>> {
    let mut task = Task::Token;
    let mut store = StoreChoice::File(FileTokenStore::default_path());

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "token" => task = Task::Token,
            "status" => task = Task::Status,
            "logout" => task = Task::Logout,
            "--keychain" => store = StoreChoice::Keychain,
            "--store" => {
                let path = args.next().ok_or_else(|| anyhow!("--store requires a path"))?;
                store = StoreChoice::File(PathBuf::from(path));
            }
            "help" | "--help" | "-h" => return Ok(None),
            unknown => bail!("Unknown argument: {unknown}"),
        }
    }

    Ok(Some((task, store)))
}

/// Read-only or token-producing work that needs a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Query {
    Token,
    Status,
}

async fn run(task: Task, store: StoreChoice) -> anyhow::Result<()> {
    let query = match task {
        Task::Token => Query::Token,
        Task::Status => Query::Status,
        Task::Logout => return logout(store).await,
    };

    match store {
        StoreChoice::File(path) => {
            tracing::debug!(path = %path.display(), "using file token store");
            run_with_store(query, Arc::new(FileTokenStore::new(path))).await
        }
        StoreChoice::Keychain => run_with_store(query, Arc::new(KeychainTokenStore::default())).await,
    }
}

async fn logout(store: StoreChoice) -> anyhow::Result<()> {
    match store {
        StoreChoice::File(path) => {
            FileTokenStore::new(path).clear().await.context("failed to remove token file")?;
        }
        StoreChoice::Keychain => {
            KeychainTokenStore::default().clear().await.context("failed to clear keychain")?;
        }
    }
    println!("Signed out.");
    Ok(())
}

async fn run_with_store<S: TokenStore + 'static>(query: Query, store: Arc<S>) -> anyhow::Result<()> {
    let config = config::load().context("failed to load Threads OAuth configuration")?;
    let controller = PkceFlowController::new(config, store, Arc::new(ConsolePresenter::new()));

    match query {
        Query::Status => {
            let state = controller.token_state().await.context("failed to read token store")?;
            println!("{state}");
        }
        Query::Token => {
            let token = controller.get_access_token().await.map_err(|e| {
                if e.requires_reauthorization() {
                    anyhow!("{e} (run `threads-token logout` and authorize again)")
                } else {
                    anyhow!(e)
                }
            })?;
            println!("{}", token.as_str());
        }
    }
    Ok(())
}

fn print_help() {
    println!("threads-token: obtain a Threads API access token");
    println!();
    println!("USAGE:");
    println!("    threads-token [TASK] [--store <PATH> | --keychain]");
    println!();
    println!("TASKS:");
    println!("    token     Print a valid access token, refreshing or authorizing as needed (default)");
    println!("    status    Print the stored token state without network access");
    println!("    logout    Delete the stored token record");
    println!();
    println!("CONFIGURATION:");
    println!("    THREADS_CLIENT_ID, THREADS_APP_SECRET, THREADS_USE_PROXIED_URLS, THREADS_SCOPES");
    println!("    or threads-auth.toml / config.toml (JSON also accepted)");
}
