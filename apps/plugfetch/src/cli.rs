//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// plugfetch - fetch, verify and install signed plugin host releases
#[derive(Parser, Debug)]
#[command(name = "plugfetch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch, verify and install signed plugin host releases")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser, Debug)]
pub struct GlobalArgs {
    /// Output events as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH", env = "PLUGFETCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the release server base URL
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download, verify and install a release
    #[command(alias = "i")]
    Install {
        /// Release version label, e.g. 2.4.1
        version: String,

        /// Directory the artifacts are installed into
        #[arg(short, long, value_name = "DIR")]
        dest: Option<PathBuf>,

        /// Parent directory for the temporary staging area
        #[arg(long, value_name = "DIR")]
        staging_dir: Option<PathBuf>,
    },

    /// Print the URLs a release would be fetched from
    Urls {
        /// Release version label
        version: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_takes_version_and_destination() {
        let cli = Cli::try_parse_from([
            "plugfetch",
            "install",
            "2.4.1",
            "--dest",
            "/opt/plugins",
            "--json",
        ])
        .unwrap();
        assert!(cli.global.json);
        match cli.command {
            Commands::Install { version, dest, staging_dir } => {
                assert_eq!(version, "2.4.1");
                assert_eq!(dest, Some(PathBuf::from("/opt/plugins")));
                assert!(staging_dir.is_none());
            }
            Commands::Urls { .. } => panic!("parsed the wrong command"),
        }
    }

    #[test]
    fn version_is_required() {
        assert!(Cli::try_parse_from(["plugfetch", "install"]).is_err());
    }
}
