//! pulseboard CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use pulseboard_client::cli::{AuthMethod, Cli, Command, ConfigAction};
use pulseboard_client::commands::{self, auth::GoogleOptions};
use pulseboard_client::config::ClientConfig;
use pulseboard_client::error::{ClientError, ClientResult};
use pulseboard_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = match (&cli.command, cli.debug) {
        (Some(Command::Server), false) => TracingConfig::daemon(),
        (Some(Command::Server), true) => TracingConfig::daemon().with_level(Level::DEBUG),
        (_, true) => TracingConfig::cli_debug(),
        (_, false) => TracingConfig::cli(),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config_path();
    let config = if cli.config.is_some() {
        ClientConfig::load_from(&config_path).map_err(ClientError::Config)?
    } else {
        ClientConfig::load().map_err(ClientError::Config)?
    };

    match cli.command {
        Some(Command::Auth { ref method }) => match method {
            AuthMethod::Google {
                code,
                direct,
                client_id,
                client_secret,
                credentials_file,
            } => {
                let options = GoogleOptions {
                    code: code.clone(),
                    direct: *direct,
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    credentials_file: credentials_file.clone(),
                };
                commands::auth::google(options, &cli, &config, &config_path).await
            }
            AuthMethod::Exchange { code, redirect_uri } => {
                commands::auth::exchange(code.clone(), redirect_uri.clone(), &config).await
            }
            AuthMethod::Login {
                email,
                password,
                direct,
            } => {
                commands::auth::login(email.clone(), password.clone(), *direct, &cli, &config)
                    .await
            }
        },
        Some(Command::Refresh { force }) => commands::feed::refresh(force, &cli, &config).await,
        Some(Command::Status) => commands::server::status(&cli, &config).await,
        Some(Command::Server) => commands::server::run(&cli, &config).await,
        Some(Command::Config { ref action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config, &config_path),
        },
        None => commands::feed::show(&cli, &config).await,
    }
}
