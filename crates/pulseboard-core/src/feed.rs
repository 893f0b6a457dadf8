//! Home feed sections.
//!
//! The home feed shows two sections, "Happening Now" (`LIVE`) and
//! "Upcoming" (`UPCOMING`). Each section is the full event list filtered by
//! badge and then ranked with [`rank_by_following`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Badge, Event, FollowedSet, Viewer};
use crate::rank::rank_by_following;

/// The two ranked sections of the home feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSections {
    /// Live events, followed organizers first.
    pub live: Vec<Event>,
    /// Upcoming events, followed organizers first.
    pub upcoming: Vec<Event>,
}

impl FeedSections {
    /// Builds both sections from the full event list.
    ///
    /// Events with any badge other than `LIVE` or `UPCOMING` appear in
    /// neither section.
    pub fn build(events: &[Event], following: &FollowedSet) -> Self {
        Self {
            live: rank_section(events, &Badge::Live, following),
            upcoming: rank_section(events, &Badge::Upcoming, following),
        }
    }

    /// Total number of events across both sections.
    pub fn len(&self) -> usize {
        self.live.len() + self.upcoming.len()
    }

    /// Returns true if both sections are empty.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty() && self.upcoming.is_empty()
    }

    /// Turns both sections into display cards, keeping ranked order.
    pub fn cards(self, following: &FollowedSet) -> (Vec<FeedCard>, Vec<FeedCard>) {
        let to_cards = |events: Vec<Event>| -> Vec<FeedCard> {
            events
                .into_iter()
                .map(|e| FeedCard::new(e, following))
                .collect()
        };
        (to_cards(self.live), to_cards(self.upcoming))
    }
}

fn rank_section(events: &[Event], badge: &Badge, following: &FollowedSet) -> Vec<Event> {
    let matching: Vec<Event> = events
        .iter()
        .filter(|e| &e.badge == badge)
        .cloned()
        .collect();
    rank_by_following(&matching, following)
}

/// A display-ready event card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedCard {
    /// The underlying event.
    #[serde(flatten)]
    pub event: Event,
    /// Whether the viewer follows the event's organizer.
    pub followed: bool,
    /// Resolved accent color (`#RRGGBB`).
    pub accent: String,
}

impl FeedCard {
    /// Creates a card for an event as seen by a viewer.
    pub fn new(event: Event, following: &FollowedSet) -> Self {
        let followed = following.follows(&event);
        let accent = event.accent().to_hex();
        Self {
            event,
            followed,
            accent,
        }
    }
}

/// A display-ready view of the whole home feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedView {
    /// Display name of the viewer.
    pub viewer_name: String,
    /// Live section.
    pub live: Vec<FeedCard>,
    /// Upcoming section.
    pub upcoming: Vec<FeedCard>,
    /// When the underlying data was last loaded successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl FeedView {
    /// Builds a view from a viewer and the full event list.
    pub fn build(viewer: &Viewer, events: &[Event], last_updated: Option<DateTime<Utc>>) -> Self {
        let (live, upcoming) =
            FeedSections::build(events, &viewer.following).cards(&viewer.following);

        Self {
            viewer_name: viewer.name.clone(),
            live,
            upcoming,
            last_updated,
        }
    }

    /// Returns true if no data has been loaded yet.
    pub fn is_loading(&self) -> bool {
        self.last_updated.is_none()
    }

    /// Drops cards whose organizer is not followed.
    pub fn retain_followed(&mut self) {
        self.live.retain(|c| c.followed);
        self.upcoming.retain(|c| c.followed);
    }

    /// Caps each section to at most `limit` cards.
    pub fn truncate(&mut self, limit: usize) {
        self.live.truncate(limit);
        self.upcoming.truncate(limit);
    }
}
