//! Feed commands: show the home feed, ask for a reload.

use pulseboard_core::{FeedFormatter, FeedView, FormatOptions, OutputFormat};
use pulseboard_protocol::{Request, Response};

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Fetches the ranked feed from the daemon and prints it.
pub async fn show(cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    let client = super::socket_client(cli, config);
    let request = Request::GetFeed {
        limit: cli.limit.or(config.feed.limit),
        followed_only: cli.followed_only || config.feed.followed_only,
    };

    let feed = match client.call(request).await? {
        Response::Feed { feed } => feed,
        other => {
            return Err(ClientError::Protocol(format!(
                "unexpected response: {:?}",
                other
            )));
        }
    };

    println!("{}", render(&feed, cli.output_format(), format_options(cli, config))?);
    Ok(())
}

/// Asks the daemon to reload viewer and events.
pub async fn refresh(force: bool, cli: &Cli, config: &ClientConfig) -> ClientResult<()> {
    super::socket_client(cli, config)
        .call(Request::refresh(force))
        .await?;
    println!("Refresh requested.");
    Ok(())
}

fn format_options(cli: &Cli, config: &ClientConfig) -> FormatOptions {
    FormatOptions {
        max_title_length: cli.max_title_length.or(config.feed.max_title_length),
        color: cli.color,
        ..FormatOptions::default()
    }
}

fn render(feed: &FeedView, format: OutputFormat, options: FormatOptions) -> ClientResult<String> {
    match format {
        OutputFormat::Tty => Ok(FeedFormatter::new(options).format_tty(feed)),
        OutputFormat::Json => serde_json::to_string_pretty(feed)
            .map_err(|e| ClientError::Protocol(format!("failed to serialize feed: {}", e))),
    }
}
