//! Backend response shapes and their normalization.
//!
//! The profile endpoint has been seen returning the user at the top level and
//! wrapped in a `data` object; the event feed likewise comes as a bare array
//! or under `data`. Both are folded into one shape here so nothing past the
//! client has to care.

use pulseboard_core::{Event, FollowedSet, Viewer};
use serde::Deserialize;
use tracing::warn;

/// Raw profile response from `GET /api/users/me`.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    following: Option<Vec<FollowRef>>,
    #[serde(default)]
    data: Option<ProfileData>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    following: Option<Vec<FollowRef>>,
}

/// One entry of a followed collection: a bare id or a populated document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FollowRef {
    Id(String),
    Doc {
        #[serde(rename = "_id", default)]
        mongo_id: Option<String>,
        #[serde(default)]
        id: Option<String>,
    },
    Other(serde::de::IgnoredAny),
}

impl ProfileResponse {
    /// Folds both response shapes into one viewer.
    ///
    /// A top-level `following` wins when present, even if empty; otherwise
    /// the nested one is used; a missing collection is empty.
    pub fn into_viewer(self) -> Viewer {
        let data = self.data.unwrap_or_default();
        let name = self.name.or(data.name).unwrap_or_default();
        let refs = self.following.or(data.following).unwrap_or_default();

        let following: FollowedSet = refs
            .into_iter()
            .filter_map(|r| match r {
                FollowRef::Id(id) => Some(id),
                FollowRef::Doc { mongo_id, id } => {
                    let id = mongo_id.or(id);
                    if id.is_none() {
                        warn!("ignoring followed document without an id");
                    }
                    id
                }
                FollowRef::Other(_) => {
                    warn!("ignoring unrecognized entry in followed collection");
                    None
                }
            })
            .collect();

        Viewer::new(name, following)
    }
}

/// Raw event feed response from `GET /api/events/feed`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeedResponse {
    Bare(Vec<Event>),
    Wrapped { data: Vec<Event> },
}

impl FeedResponse {
    pub fn into_events(self) -> Vec<Event> {
        match self {
            Self::Bare(events) | Self::Wrapped { data: events } => events,
        }
    }
}
