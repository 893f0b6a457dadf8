//! The daemon's view state.
//!
//! [`HomeState`] holds what the home screen shows: the viewer, the raw event
//! list and load bookkeeping. Request handlers only read it; every write goes
//! through the [`FeedLoader`](crate::FeedLoader).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use pulseboard_core::{Event, FeedView, Viewer};
use pulseboard_protocol::StatusInfo;

/// Home feed state shared across connections.
#[derive(Debug)]
pub struct HomeState {
    started_at: DateTime<Utc>,
    viewer: Viewer,
    events: Vec<Event>,
    last_load: Option<DateTime<Utc>>,
    last_error: Option<String>,
    /// Generation of the data currently held; 0 until the first commit.
    generation: u64,
    shutdown_requested: bool,
}

impl Default for HomeState {
    fn default() -> Self {
        Self::new()
    }
}

impl HomeState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            viewer: Viewer::placeholder(),
            events: Vec::new(),
            last_load: None,
            last_error: None,
            generation: 0,
            shutdown_requested: false,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        let duration = Utc::now() - self.started_at;
        duration.num_seconds().max(0) as u64
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Builds the ranked feed, optionally filtered and capped per section.
    pub fn feed_view(&self, limit: Option<usize>, followed_only: bool) -> FeedView {
        let mut view = FeedView::build(&self.viewer, &self.events, self.last_load);
        if followed_only {
            view.retain_followed();
        }
        if let Some(limit) = limit {
            view.truncate(limit);
        }
        view
    }

    pub fn status_info(&self, load_in_flight: bool) -> StatusInfo {
        StatusInfo {
            uptime_seconds: self.uptime_seconds(),
            viewer_name: self.last_load.map(|_| self.viewer.name.clone()),
            event_count: self.events.len(),
            last_load: self.last_load,
            last_error: self.last_error.clone(),
            generation: self.generation,
            load_in_flight,
        }
    }

    /// Replaces viewer and events with the result of load `generation`.
    ///
    /// Returns false, leaving the state untouched, when data from the same or
    /// a newer load is already held.
    pub(crate) fn commit(
        &mut self,
        generation: u64,
        viewer: Viewer,
        events: Vec<Event>,
        loaded_at: DateTime<Utc>,
    ) -> bool {
        if generation <= self.generation {
            debug!(
                generation,
                current = self.generation,
                "Discarding result of superseded load"
            );
            return false;
        }

        self.viewer = viewer;
        self.events = events;
        self.last_load = Some(loaded_at);
        self.last_error = None;
        self.generation = generation;
        true
    }

    /// Records a failed load without touching the displayed data.
    ///
    /// Failures of loads older than the held data are ignored.
    pub(crate) fn record_failure(&mut self, generation: u64, error: impl Into<String>) -> bool {
        if generation <= self.generation {
            return false;
        }
        self.last_error = Some(error.into());
        true
    }

    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }
}

/// Shared state wrapped in an `Arc<RwLock>`.
pub type SharedState = Arc<RwLock<HomeState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(RwLock::new(HomeState::new()))
}
