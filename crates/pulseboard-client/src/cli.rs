//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use pulseboard_core::OutputFormat;

use crate::config::ClientConfig;

/// pulseboard - events from the organizers you follow, first
#[derive(Debug, Parser)]
#[command(name = "pulseboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "PULSEBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    // --- Feed options ---
    /// Maximum number of cards per section
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only show events from organizers you follow
    #[arg(long)]
    pub followed_only: bool,

    /// Maximum title length (truncated with ellipsis)
    #[arg(long)]
    pub max_title_length: Option<usize>,

    /// Paint follow markers in the organizer's accent color
    #[arg(long)]
    pub color: bool,

    // --- Connection flags ---
    /// Path to the server socket
    #[arg(long, env = "PULSEBOARD_SOCKET")]
    pub socket_path: Option<PathBuf>,

    /// Connection timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Tty
        }
    }

    /// The config file in effect: `--config`/`PULSEBOARD_CONFIG`, else the
    /// default location. Commands that write config go here too.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(ClientConfig::default_path)
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in to the backend
    Auth {
        #[command(subcommand)]
        method: AuthMethod,
    },

    /// Ask the daemon to reload the feed
    Refresh {
        /// Skip the refresh cooldown
        #[arg(long, short)]
        force: bool,
    },

    /// Show daemon status
    Status,

    /// Start the server daemon in the foreground
    Server,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Sign-in methods.
#[derive(Debug, Subcommand)]
pub enum AuthMethod {
    /// Sign in with Google
    ///
    /// Opens the browser for consent unless `--code` is given, then hands the
    /// authorization code to the backend.
    Google {
        /// Authorization code obtained elsewhere
        #[arg(long)]
        code: Option<String>,

        /// Talk to the backend directly instead of through the daemon
        #[arg(long)]
        direct: bool,

        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to Google Cloud Console credentials JSON file
        ///
        /// This is the JSON file downloaded from the Google Cloud Console
        /// OAuth 2.0 credentials page. Alternative to providing client_id
        /// and client_secret separately.
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,
    },

    /// Exchange a Google authorization code locally and show who it belongs to
    Exchange {
        /// The authorization code
        code: String,

        /// Redirect URI the code was issued for
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,

        #[arg(long, env = "PULSEBOARD_PASSWORD", hide_env_values = true)]
        password: String,

        /// Talk to the backend directly instead of through the daemon
        #[arg(long)]
        direct: bool,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_is_feed_in_tty() {
        let cli = Cli::try_parse_from(["pulseboard", "--limit", "3", "--followed-only"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.limit, Some(3));
        assert!(cli.followed_only);
        assert_eq!(cli.output_format(), OutputFormat::Tty);

        let cli = Cli::try_parse_from(["pulseboard", "--json"]).unwrap();
        assert_eq!(cli.output_format(), OutputFormat::Json);
    }

    #[test]
    fn config_path_follows_flag() {
        let cli = Cli::try_parse_from([
            "pulseboard",
            "--config",
            "/tmp/pb/alt.toml",
            "auth",
            "google",
        ])
        .unwrap();
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/pb/alt.toml"));

        let cli = Cli {
            config: None,
            ..cli
        };
        assert_eq!(cli.config_path(), ClientConfig::default_path());
    }

    #[test]
    fn parses_auth_subcommands() {
        let cli = Cli::try_parse_from([
            "pulseboard",
            "auth",
            "login",
            "--email",
            "a@b.c",
            "--password",
            "pw",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Auth {
                method: AuthMethod::Login { ref email, direct: false, .. }
            }) if email == "a@b.c"
        ));

        let cli =
            Cli::try_parse_from(["pulseboard", "auth", "google", "--code", "4/abc", "--direct"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Auth {
                method: AuthMethod::Google { code: Some(ref c), direct: true, .. }
            }) if c == "4/abc"
        ));
    }

    #[test]
    fn parses_refresh_force() {
        let cli = Cli::try_parse_from(["pulseboard", "refresh", "--force"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Refresh { force: true })));
    }
}
