//! The feed loader, sole writer of [`HomeState`](crate::HomeState).
//!
//! A load fetches the viewer profile and the event feed together and commits
//! both or neither. When either fetch fails the previous data stays on
//! display and only `last_error` changes.
//!
//! Loads may overlap (a scheduler tick, a manual refresh and a login can all
//! arrive at once). Non-forced loads are dropped while another load is in
//! flight. Every load takes a generation number when it starts, and a result
//! is committed only if nothing newer has been committed, so a slow older
//! load can never overwrite a faster newer one.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pulseboard_api::Backend;

use crate::state::SharedState;

/// What caused a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTrigger {
    Startup,
    /// Periodic scheduler tick.
    Tick,
    /// Explicit refresh request or SIGHUP.
    Refresh,
    /// A login just succeeded.
    Login,
}

impl LoadTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Tick => "tick",
            Self::Refresh => "refresh",
            Self::Login => "login",
        }
    }
}

impl fmt::Display for LoadTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one load attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// New data is on display.
    Committed { generation: u64 },
    /// The fetch succeeded but newer data was already committed.
    Superseded { generation: u64 },
    /// A fetch failed; previous data kept.
    Failed { generation: u64, error: String },
    /// Not started because another load was in flight.
    Coalesced,
}

impl LoadOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// Collapses the outcome for the scheduler: only a failure is an error.
    pub fn into_result(self) -> Result<(), String> {
        match self {
            Self::Failed { error, .. } => Err(error),
            _ => Ok(()),
        }
    }
}

/// Loads viewer and events from the backend into the shared state.
pub struct FeedLoader {
    backend: Arc<dyn Backend>,
    state: SharedState,
    next_generation: AtomicU64,
    in_flight: AtomicUsize,
}

impl FeedLoader {
    pub fn new(backend: Arc<dyn Backend>, state: SharedState) -> Self {
        Self {
            backend,
            state,
            next_generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Returns true while at least one load is running.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Runs one load to completion.
    ///
    /// With `force` false the load is skipped if another one is in flight.
    #[tracing::instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn load(&self, trigger: LoadTrigger, force: bool) -> LoadOutcome {
        let Some(_guard) = self.enter(force) else {
            debug!(%trigger, "Load already in flight, coalescing");
            return LoadOutcome::Coalesced;
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(%trigger, generation, "Starting load");

        let result = tokio::try_join!(
            self.backend.fetch_profile(),
            self.backend.fetch_event_feed()
        );

        let mut state = self.state.write().await;
        match result {
            Ok((viewer, events)) => {
                let count = events.len();
                if state.commit(generation, viewer, events, Utc::now()) {
                    info!(%trigger, generation, event_count = count, "Feed loaded");
                    LoadOutcome::Committed { generation }
                } else {
                    LoadOutcome::Superseded { generation }
                }
            }
            Err(e) => {
                warn!(%trigger, generation, error = %e, "Feed load failed, keeping previous data");
                let error = e.to_string();
                state.record_failure(generation, error.clone());
                LoadOutcome::Failed { generation, error }
            }
        }
    }

    /// Runs a load on its own task.
    pub fn spawn(self: &Arc<Self>, trigger: LoadTrigger, force: bool) -> JoinHandle<LoadOutcome> {
        let loader = Arc::clone(self);
        tokio::spawn(async move { loader.load(trigger, force).await })
    }

    fn enter(&self, force: bool) -> Option<InFlightGuard<'_>> {
        if force {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
        } else if self
            .in_flight
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        Some(InFlightGuard(&self.in_flight))
    }
}

impl fmt::Debug for FeedLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedLoader")
            .field("backend", &self.backend.name())
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish()
    }
}

/// Decrements the in-flight count even if the load future is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use pulseboard_api::{
        ApiError, ApiResult, AuthorizationGrant, Backend, BoxFuture, Session,
    };
    use pulseboard_core::{Badge, Event, FollowedSet, Viewer};

    /// Scriptable backend. Load `n` returns a viewer named `viewer-n`.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        loads: AtomicUsize,
        pub(crate) fail: AtomicBool,
        delays: Mutex<VecDeque<Duration>>,
        pub(crate) reject_logins: AtomicBool,
        pub(crate) grants: Mutex<Vec<AuthorizationGrant>>,
    }

    impl FakeBackend {
        /// Queues a delay for the next profile fetch.
        pub(crate) fn delay_next(&self, delay: Duration) {
            self.delays.lock().unwrap().push_back(delay);
        }

        pub(crate) fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        pub(crate) fn events() -> Vec<Event> {
            vec![
                Event::new("e1", "Open mic", Badge::Live).with_club("music"),
                Event::new("e2", "Chess night", Badge::Live).with_club("chess"),
                Event::new("e3", "Robot build", Badge::Upcoming).with_club("robotics"),
            ]
        }
    }

    impl Backend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        fn fetch_profile(&self) -> BoxFuture<'_, ApiResult<Viewer>> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = self.delays.lock().unwrap().pop_front();
            let fail = self.fail.load(Ordering::SeqCst);
            Box::pin(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if fail {
                    return Err(ApiError::network("connection refused"));
                }
                let following: FollowedSet = ["chess"].into_iter().collect();
                Ok(Viewer::new(format!("viewer-{}", n), following))
            })
        }

        fn fetch_event_feed(&self) -> BoxFuture<'_, ApiResult<Vec<Event>>> {
            Box::pin(async move { Ok(Self::events()) })
        }

        fn google_session<'a>(
            &'a self,
            grant: &'a AuthorizationGrant,
        ) -> BoxFuture<'a, ApiResult<Session>> {
            Box::pin(async move {
                self.grants.lock().unwrap().push(grant.clone());
                if self.reject_logins.load(Ordering::SeqCst) {
                    return Err(ApiError::from_response(401, r#"{"message":"invalid code"}"#));
                }
                Ok(Session::new("google", Some("tok".into())))
            })
        }

        fn login<'a>(
            &'a self,
            email: &'a str,
            password: &'a str,
        ) -> BoxFuture<'a, ApiResult<Session>> {
            Box::pin(async move {
                if email.is_empty() || password.is_empty() {
                    return Err(ApiError::missing_fields(
                        "Please enter both email and password.",
                    ));
                }
                if self.reject_logins.load(Ordering::SeqCst) {
                    return Err(ApiError::from_response(
                        401,
                        r#"{"message":"Invalid credentials"}"#,
                    ));
                }
                Ok(Session::new("password", Some("tok".into())))
            })
        }
    }
}
