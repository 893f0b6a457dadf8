//! Core types: events, viewer, feed ranking, formatting

pub mod event;
pub mod feed;
pub mod format;
pub mod rank;
pub mod tracing;

pub use event::{Badge, Event, FollowedSet, Rgb, THEME_ACCENT, Viewer};
pub use feed::{FeedCard, FeedSections, FeedView};
pub use format::{FeedFormatter, FormatOptions, OutputFormat, ellipsis};
pub use rank::rank_by_following;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
