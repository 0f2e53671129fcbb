//! Argument definitions for the `entitle` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Register systems and products against an SCC-compatible registration
/// server.
#[derive(Debug, Parser)]
#[command(name = "entitle", version, about, max_term_width = 100)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Registration server base URL (overrides the config file).
    #[arg(long, global = true, env = "ENTITLE_URL")]
    pub url: Option<String>,

    /// Skip TLS verification. For test servers only.
    #[arg(short = 'k', long, global = true)]
    pub insecure: bool,

    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Credentials file location.
    #[arg(long, global = true, value_name = "PATH")]
    pub credentials: Option<PathBuf>,

    /// Emit machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the activation state known to the server.
    Status(StatusArgs),

    /// Announce this system and activate a product.
    Register(RegisterArgs),

    /// Remove this system and its credentials.
    Deregister,

    /// Trust-anchor certificate operations.
    #[command(subcommand)]
    Cert(CertCommand),
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// JSON file with the locally installed products to report on
    /// (array of {identifier, version, arch}). Without it, the raw
    /// server-side activations are shown.
    #[arg(long, value_name = "FILE")]
    pub installed: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Registration code authorizing the subscription.
    #[arg(short, long, value_name = "CODE")]
    pub regcode: String,

    /// Product to activate, as IDENTIFIER/VERSION/ARCH. Without it only
    /// the system announcement is performed.
    #[arg(short, long, value_name = "TRIPLET")]
    pub product: Option<String>,

    /// Email address to attach to the subscription.
    #[arg(short, long)]
    pub email: Option<String>,

    /// Hostname reported to the server.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Distribution target hint.
    #[arg(long, value_name = "TARGET")]
    pub distro_target: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum CertCommand {
    /// Print the SHA1 and SHA256 fingerprints of a certificate file.
    Fingerprint {
        /// PEM or DER certificate file.
        file: PathBuf,
    },

    /// Import a certificate as the registration trust anchor.
    Import {
        /// PEM or DER certificate file.
        file: PathBuf,
    },
}
