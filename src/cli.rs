use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ip-gate",
    about = "IP whitelist and API-key access gate",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config", env = "IP_GATE_CONFIG", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve,

    /// Manage whitelist entries directly in the database
    #[command(subcommand)]
    Whitelist(WhitelistCommand),

    /// Issue a new API key and print it once
    IssueKey {
        /// Free-text label stored with the key
        #[arg(long)]
        description: Option<String>,

        /// Expire the key after this many days
        #[arg(long)]
        days: Option<i64>,
    },

    /// Deactivate an API key by id
    RevokeKey {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum WhitelistCommand {
    /// Add or reactivate an address or CIDR block
    Add {
        spec: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Deactivate an entry
    Remove {
        spec: String,
    },
    /// Show every entry, active and inactive
    List,
    /// Replace an entry's description
    Update {
        spec: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Reload the cache from the database and report its size
    RefreshCache,
    /// Show cache statistics
    CacheInfo,
}
