//! Command and subcommand definitions.

use clap::Subcommand;

/// Top-level commands available in aitk.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encrypted .env store backed by a git repository
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },
    /// Manage stored credentials (interactive setup when no subcommand)
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Verify that credentials resolve (default: every known API key)
    Check {
        /// Credential names to check
        keys: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum EnvCommands {
    /// Generate the store key pair and print the config lines to add
    ///
    /// Keys come from the built-in age implementation unless
    /// ENV_STORE_BACKEND=age-cli, which runs the age-keygen binary.
    Init {
        /// Generate a new pair even if ENV_STORE_KEY is already set
        #[arg(long)]
        force: bool,
    },
    /// Encrypt local .env files and push them to the store
    Push {
        /// Project identity in the store (owner/repo)
        project: String,
    },
    /// Fetch and decrypt the project's .env files, overwriting local copies
    Pull {
        /// Project identity in the store (owner/repo)
        project: String,
    },
    /// Show which keys differ between local and stored files (values are never shown)
    Diff {
        /// Project identity in the store (owner/repo)
        project: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List projects in the store, or the files of one project
    List {
        /// Project identity in the store (owner/repo)
        project: Option<String>,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show a value (masked unless --reveal) and where it came from
    Get {
        key: String,

        /// Print the value unmasked
        #[arg(long)]
        reveal: bool,
    },
    /// Store a value in the config file
    Set { key: String, value: String },
    /// Remove a value from the config file
    Unset { key: String },
    /// List config file entries (masked)
    List,
    /// Print the config file path
    Path,
}
