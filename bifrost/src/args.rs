use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments for the Bifrost gateway process.
#[derive(Debug, Parser)]
#[command(name = "bifrost", version, about = "Unified gateway for LLM providers")]
pub(crate) struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "BIFROST_CONFIG", default_value = "bifrost.toml")]
    pub(crate) config: PathBuf,

    /// Log filter, following `env_logger` syntax (e.g. `info,gateway=debug`).
    #[arg(long, env = "BIFROST_LOG", default_value = "info")]
    pub(crate) log: String,

    /// Disable colored log output.
    #[arg(long, env = "BIFROST_LOG_NO_COLOR")]
    pub(crate) no_color: bool,
}
