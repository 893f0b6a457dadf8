//! Output formatting for the home feed.
//!
//! Two output formats are supported:
//! - **TTY**: human-readable terminal output, followed organizers marked with a star
//! - **JSON**: the [`FeedView`] serialized as-is, for scripts
//!
//! # Example
//!
//! ```rust
//! use pulseboard_core::format::{FeedFormatter, FormatOptions};
//! use pulseboard_core::{Event, FeedView, Viewer};
//!
//! let viewer = Viewer::new("Ada", ["chess"].into_iter().collect());
//! let events = vec![Event::new("e1", "Blitz", "LIVE").with_club("chess")];
//! let view = FeedView::build(&viewer, &events, None);
//!
//! let text = FeedFormatter::new(FormatOptions::default()).format_tty(&view);
//! assert!(text.contains("Blitz"));
//! ```

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::event::{Badge, Rgb};
use crate::feed::{FeedCard, FeedView};

/// The output format for feed display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable terminal output.
    #[default]
    Tty,
    /// Machine-readable JSON output.
    Json,
}

/// Configuration options for output formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOptions {
    /// Maximum length for event titles (truncated with ellipsis).
    pub max_title_length: Option<usize>,
    /// Paint the follow marker with the event's accent color (24-bit ANSI).
    pub color: bool,
    /// Text shown in a section without events.
    pub no_events_text: String,
    /// Text shown while nothing has been loaded yet.
    pub loading_text: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_title_length: None,
            color: false,
            no_events_text: "No events".to_string(),
            loading_text: "Loading...".to_string(),
        }
    }
}

/// Formats a [`FeedView`] for display.
#[derive(Debug, Clone, Default)]
pub struct FeedFormatter {
    options: FormatOptions,
}

impl FeedFormatter {
    /// Creates a new formatter with the given options.
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    /// Formats the feed as multi-line terminal text.
    pub fn format_tty(&self, view: &FeedView) -> String {
        let mut lines = vec![format!("Welcome back, {}", view.viewer_name)];

        if view.is_loading() && view.live.is_empty() && view.upcoming.is_empty() {
            lines.push(String::new());
            lines.push(self.options.loading_text.clone());
            return lines.join("\n");
        }

        for (title, cards) in [("HAPPENING NOW", &view.live), ("UPCOMING", &view.upcoming)] {
            lines.push(String::new());
            lines.push(title.to_string());
            if cards.is_empty() {
                lines.push(format!("  {}", self.options.no_events_text));
            }
            lines.extend(cards.iter().map(|card| self.format_card(card)));
        }

        lines.join("\n")
    }

    /// Formats a single card as one line.
    pub fn format_card(&self, card: &FeedCard) -> String {
        let marker = match (card.followed, self.options.color) {
            (false, _) => " ".to_string(),
            (true, false) => "★".to_string(),
            (true, true) => {
                let rgb = Rgb::from_hex(&card.accent).unwrap_or(Rgb::WHITE);
                paint("★", rgb)
            }
        };

        let event = &card.event;
        let title = match self.options.max_title_length {
            Some(max) => ellipsis(&event.title, max),
            None => Cow::Borrowed(event.title.as_str()),
        };

        let mut line = format!("  {marker} ");
        if let Some(icon) = event.icon.as_deref().filter(|i| !i.is_empty()) {
            line.push_str(icon);
            line.push(' ');
        }
        line.push_str(&title);

        // Live cards name the organizer, upcoming cards show the day.
        let lead = match event.badge {
            Badge::Live => event.club_name.clone(),
            _ => event.date.map(|d| d.format("%b %-d").to_string()),
        };
        for detail in [lead.as_deref(), event.time.as_deref(), event.location.as_deref()]
            .into_iter()
            .flatten()
            .filter(|d| !d.is_empty())
        {
            line.push_str(" · ");
            line.push_str(detail);
        }
        line
    }
}

/// Wraps text in a 24-bit ANSI foreground color.
pub fn paint(text: &str, rgb: Rgb) -> String {
    format!("\x1b[38;2;{};{};{}m{}\x1b[0m", rgb.r, rgb.g, rgb.b, text)
}

/// Truncates a string with ellipsis if it exceeds the given length.
pub fn ellipsis(s: &str, max_len: usize) -> Cow<'_, str> {
    if max_len == 0 {
        return Cow::Borrowed("");
    }

    if s.chars().count() <= max_len {
        return Cow::Borrowed(s);
    }

    let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
    Cow::Owned(format!("{}...", truncated))
}
