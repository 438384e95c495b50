//! trailblazer-dash: command-line client for the Trailblazer dashboard.
//!
//! Each invocation restores the session from client storage
//! (`~/.trailblazer/client-storage.json`), so a `login` persists until a
//! `logout` from any invocation. Results are printed as JSON on stdout; logs
//! go to stderr.
//!
//! ## Subcommands
//!
//! - `login`, `logout`, `whoami`: session management
//! - `analyses`, `show`: browse analyses
//! - `comment`, `hide`, `unhide`: edit an analysis
//! - `jobs`, `info`: failed-job ranking and data freshness

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trailblazer_dash_protocol::AnalysisStatus;

#[derive(Parser)]
#[command(name = "trailblazer-dash")]
#[command(about = "Trailblazer analysis dashboard client")]
#[command(version)]
struct Cli {
    /// API base URL (overrides config.toml and TRAILBLAZER_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Config file (default: ~/.trailblazer/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with a bearer token from the identity provider
    Login {
        #[arg(value_name = "TOKEN")]
        token: String,
    },

    /// End the session on this machine
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List analyses
    Analyses {
        /// Search text (case id, family, ...)
        #[arg(long)]
        query: Option<String>,

        /// Only show analyses with this status
        #[arg(long)]
        status: Option<AnalysisStatus>,

        /// List hidden analyses instead of visible ones
        #[arg(long)]
        hidden: bool,
    },

    /// Show one analysis
    Show {
        #[arg(value_name = "ID")]
        id: u64,
    },

    /// Set the comment on an analysis
    Comment {
        #[arg(value_name = "ID")]
        id: u64,

        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Hide an analysis from the dashboard
    Hide {
        #[arg(value_name = "ID")]
        id: u64,
    },

    /// Make a hidden analysis visible again
    Unhide {
        #[arg(value_name = "ID")]
        id: u64,
    },

    /// Failed jobs, most frequent first
    Jobs,

    /// When the backend last refreshed its data
    Info,
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start async runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(commands::run(cli)) {
        tracing::error!(error = %e, "trailblazer-dash failed");
        std::process::exit(1);
    }
}
