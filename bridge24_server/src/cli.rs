use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "bridge24", version, about = "Bitrix24 CRM bridge")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default if no subcommand given).
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Local data directory (SQLite db lives here).
        #[arg(long, env = "BRIDGE24_DATA_DIR", default_value = ".bridge24_dev")]
        data_dir: PathBuf,
    },

    /// Pull contacts from the CRM and reconcile them into the local store.
    Sync {
        /// Classify and report without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Log every record's disposition, not just the summary.
        #[arg(long)]
        verbose: bool,

        /// Match emails byte-for-byte instead of case-insensitively.
        #[arg(long)]
        exact_email: bool,

        #[arg(long, env = "BRIDGE24_DATA_DIR", default_value = ".bridge24_dev")]
        data_dir: PathBuf,
    },

    /// Apply the database schema and exit.
    Migrate {
        #[arg(long, env = "BRIDGE24_DATA_DIR", default_value = ".bridge24_dev")]
        data_dir: PathBuf,
    },

    /// Bootstrap an account from the terminal.
    CreateUser {
        #[arg(long, env = "BRIDGE24_DATA_DIR", default_value = ".bridge24_dev")]
        data_dir: PathBuf,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long, default_value = "")]
        first_name: String,

        #[arg(long, default_value = "")]
        last_name: String,
    },
}
