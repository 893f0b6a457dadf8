//! Follow-aware feed ranking.
//!
//! Events hosted by an organizer the viewer follows are moved to the front.
//! This is a stable partition: relative order inside the followed group and
//! inside the not-followed group is exactly the input order. It is not a
//! comparator sort, so no other attribute ever reorders events.

use crate::event::{Event, FollowedSet};

/// Ranks events so that followed organizers come first.
///
/// The output has the same length and the same elements as the input. An
/// event without an organizer counts as not followed.
pub fn rank_by_following(events: &[Event], following: &FollowedSet) -> Vec<Event> {
    if following.is_empty() {
        return events.to_vec();
    }

    let (mut followed, rest): (Vec<Event>, Vec<Event>) = events
        .iter()
        .cloned()
        .partition(|event| following.follows(event));
    followed.extend(rest);
    followed
}
