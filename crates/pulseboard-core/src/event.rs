//! Event and viewer types.
//!
//! This module provides the data model shared by every crate:
//! - [`Event`]: an event record as served by the backend feed
//! - [`Badge`]: the lifecycle category of an event (live, upcoming, ...)
//! - [`Viewer`]: the signed-in user with their followed organizers
//! - [`FollowedSet`]: the set of organizer identifiers a viewer follows
//! - [`Rgb`]: an accent color parsed from `#RRGGBB`

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Accent color used when an event has no (valid) color of its own.
pub const THEME_ACCENT: &str = "#CCF900";

/// Lifecycle category of an event.
///
/// Unknown badges are preserved verbatim so a newer backend never breaks
/// deserialization; they simply appear in no feed section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Badge {
    /// The event is happening now.
    Live,
    /// The event is scheduled for later.
    Upcoming,
    /// Any other badge string.
    Other(String),
}

impl Badge {
    /// Returns the wire representation of this badge.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Live => "LIVE",
            Self::Upcoming => "UPCOMING",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Badge {
    fn from(value: String) -> Self {
        match value.as_str() {
            "LIVE" => Self::Live,
            "UPCOMING" => Self::Upcoming,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Badge {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Badge> for String {
    fn from(badge: Badge) -> Self {
        match badge {
            Badge::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Badge {
    /// A missing badge; such events appear in no feed section.
    fn default() -> Self {
        Self::Other(String::new())
    }
}

/// An event from the backend feed.
///
/// Field names follow the backend's JSON (`_id`, `clubId`, `timeDisplay`,
/// ...). Events are never mutated after deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EventWire")]
pub struct Event {
    /// Unique event identifier.
    #[serde(rename = "_id")]
    pub id: String,

    /// Identifier of the organizer ("club") hosting the event.
    #[serde(rename = "clubId", skip_serializing_if = "Option::is_none")]
    pub club_id: Option<String>,

    /// Display name of the organizer.
    #[serde(rename = "clubName", skip_serializing_if = "Option::is_none")]
    pub club_name: Option<String>,

    /// Event title.
    pub title: String,

    /// Free-form location text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Display time, already formatted by the backend (e.g. "6:30 PM").
    #[serde(rename = "timeDisplay", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Lifecycle badge. Missing on the wire means [`Badge::default`].
    pub badge: Badge,

    /// Accent color as `#RRGGBB`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Icon glyph (usually a single emoji).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Date/time of the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// Wire shape of [`Event`].
///
/// `_id`/`id` and `timeDisplay`/`time` are read as separate keys since the
/// backend may send both of each pair in one document.
#[derive(Deserialize)]
struct EventWire {
    #[serde(rename = "_id", default)]
    mongo_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "clubId", default)]
    club_id: Option<String>,
    #[serde(rename = "clubName", default)]
    club_name: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(rename = "timeDisplay", default)]
    time_display: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    badge: Badge,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    date: Option<DateTime<Utc>>,
}

impl TryFrom<EventWire> for Event {
    type Error = String;

    fn try_from(wire: EventWire) -> Result<Self, Self::Error> {
        let id = wire
            .mongo_id
            .or(wire.id)
            .ok_or_else(|| "missing field `_id`".to_string())?;
        Ok(Self {
            id,
            club_id: wire.club_id,
            club_name: wire.club_name,
            title: wire.title,
            location: wire.location,
            time: wire.time_display.or(wire.time),
            badge: wire.badge,
            color: wire.color,
            icon: wire.icon,
            date: wire.date,
        })
    }
}

impl Event {
    /// Creates a new event with the minimum required fields.
    pub fn new(id: impl Into<String>, title: impl Into<String>, badge: impl Into<Badge>) -> Self {
        Self {
            id: id.into(),
            club_id: None,
            club_name: None,
            title: title.into(),
            location: None,
            time: None,
            badge: badge.into(),
            color: None,
            icon: None,
            date: None,
        }
    }

    /// Builder: set the organizer identifier.
    pub fn with_club(mut self, club_id: impl Into<String>) -> Self {
        self.club_id = Some(club_id.into());
        self
    }

    /// Builder: set the organizer display name.
    pub fn with_club_name(mut self, club_name: impl Into<String>) -> Self {
        self.club_name = Some(club_name.into());
        self
    }

    /// Builder: set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder: set the display time.
    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// Builder: set the accent color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Builder: set the icon glyph.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Builder: set the date.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Returns the accent color for this event.
    ///
    /// A missing or malformed color falls back to the theme accent for live
    /// events and to white for everything else.
    pub fn accent(&self) -> Rgb {
        self.color
            .as_deref()
            .and_then(Rgb::from_hex)
            .unwrap_or_else(|| match self.badge {
                Badge::Live => Rgb::from_hex(THEME_ACCENT).unwrap_or(Rgb::WHITE),
                _ => Rgb::WHITE,
            })
    }
}

/// Accepts an RFC 3339 string, `null`, or a missing field. Anything else
/// becomes `None` with a warning.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<LooseDate> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        LooseDate::Text(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                warn!(value = %s, error = %e, "ignoring unparseable event date");
                None
            }
        },
        LooseDate::Other(_) => {
            warn!("ignoring non-string event date");
            None
        }
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseDate {
    Text(String),
    Other(serde::de::IgnoredAny),
}

/// The set of organizer identifiers a viewer follows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FollowedSet(HashSet<String>);

impl FollowedSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the organizer is followed.
    ///
    /// An event without an organizer is never followed.
    pub fn contains(&self, club_id: Option<&str>) -> bool {
        club_id.is_some_and(|id| self.0.contains(id))
    }

    /// Returns true if the event's organizer is followed.
    pub fn follows(&self, event: &Event) -> bool {
        self.contains(event.club_id.as_deref())
    }

    /// Adds an organizer. Returns false if it was already present.
    pub fn insert(&mut self, club_id: impl Into<String>) -> bool {
        self.0.insert(club_id.into())
    }

    /// Number of followed organizers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is followed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over followed organizer identifiers in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FollowedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// The signed-in viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    /// Display name.
    pub name: String,
    /// Followed organizers.
    #[serde(default)]
    pub following: FollowedSet,
}

impl Viewer {
    /// Creates a viewer.
    pub fn new(name: impl Into<String>, following: FollowedSet) -> Self {
        Self {
            name: name.into(),
            following,
        }
    }

    /// Placeholder shown before the first successful load.
    pub fn placeholder() -> Self {
        Self::new("Loading...", FollowedSet::new())
    }
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Pure white.
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Parses `#RRGGBB` (case-insensitive). Returns `None` for anything else.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Formats as a CSS `rgba()` string with the given opacity.
    pub fn rgba(&self, opacity: f32) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, opacity)
    }

    /// Formats as `#RRGGBB`.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn badge_roundtrip_known_and_unknown() {
        assert_eq!(Badge::from("LIVE"), Badge::Live);
        assert_eq!(Badge::from("UPCOMING"), Badge::Upcoming);
        assert_eq!(Badge::from("PAST"), Badge::Other("PAST".to_string()));
        assert_eq!(String::from(Badge::Other("PAST".into())), "PAST");
        assert_eq!(Badge::Live.to_string(), "LIVE");
    }

    #[test]
    fn badge_is_case_sensitive() {
        assert_eq!(Badge::from("live"), Badge::Other("live".to_string()));
    }

    #[test]
    fn event_from_backend_json() {
        let json = r##"{
            "_id": "65f0c1",
            "clubId": "robotics",
            "title": "Hack Night",
            "location": "Lab 3",
            "time": "18:30",
            "badge": "LIVE",
            "color": "#FF5500",
            "icon": "🤖",
            "date": "2024-03-15T18:30:00Z"
        }"##;

        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "65f0c1");
        assert_eq!(event.club_id.as_deref(), Some("robotics"));
        assert_eq!(event.badge, Badge::Live);
        assert_eq!(event.time.as_deref(), Some("18:30"));
        assert_eq!(
            event.date,
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 18, 30, 0).unwrap())
        );
    }

    #[test]
    fn event_accepts_plain_id_and_missing_optionals() {
        let json = r#"{"id": "e1", "badge": "UPCOMING"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "e1");
        assert!(event.club_id.is_none());
        assert!(event.title.is_empty());
        assert!(event.date.is_none());
    }

    #[test]
    fn event_with_bad_date_still_parses() {
        let json = r#"{"_id": "e1", "badge": "LIVE", "date": "next tuesday"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.date.is_none());

        let json = r#"{"_id": "e2", "badge": "LIVE", "date": 1710527400000}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.date.is_none());

        let json = r#"{"_id": "e3", "badge": "LIVE", "date": null}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.date.is_none());
    }

    #[test]
    fn event_serializes_with_backend_names() {
        let event = Event::new("e1", "Talk", Badge::Upcoming).with_club("chess");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["_id"], "e1");
        assert_eq!(value["clubId"], "chess");
        assert_eq!(value["badge"], "UPCOMING");
        assert!(value.get("color").is_none());
    }

    #[test]
    fn followed_set_membership() {
        let set: FollowedSet = ["a", "b"].into_iter().collect();
        assert!(set.contains(Some("a")));
        assert!(!set.contains(Some("c")));
        assert!(!set.contains(None));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn followed_set_deduplicates() {
        let set: FollowedSet = ["a", "a", "b"].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn followed_set_is_a_json_array() {
        let set: FollowedSet = serde_json::from_str(r#"["x", "y", "x"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(Some("y")));
    }

    #[test]
    fn rgb_parsing() {
        assert_eq!(
            Rgb::from_hex("#CCF900"),
            Some(Rgb {
                r: 0xCC,
                g: 0xF9,
                b: 0x00
            })
        );
        assert_eq!(Rgb::from_hex("#ccf900"), Rgb::from_hex("#CCF900"));
        assert!(Rgb::from_hex("CCF900").is_none());
        assert!(Rgb::from_hex("#CCF").is_none());
        assert!(Rgb::from_hex("#GGGGGG").is_none());
        assert!(Rgb::from_hex("#ééé").is_none());
    }

    #[test]
    fn rgba_formatting() {
        let rgb = Rgb::from_hex("#FF0080").unwrap();
        assert_eq!(rgb.rgba(0.4), "rgba(255, 0, 128, 0.4)");
        assert_eq!(rgb.to_hex(), "#FF0080");
    }

    #[test]
    fn accent_falls_back_per_badge() {
        let plain = Event::new("e1", "t", Badge::Live);
        assert_eq!(plain.accent().to_hex(), THEME_ACCENT);

        let broken = Event::new("e2", "t", Badge::Live).with_color("red");
        assert_eq!(broken.accent().to_hex(), THEME_ACCENT);

        let custom = Event::new("e3", "t", Badge::Live).with_color("#112233");
        assert_eq!(custom.accent().to_hex(), "#112233");

        let upcoming = Event::new("e4", "t", Badge::Upcoming);
        assert_eq!(upcoming.accent(), Rgb::WHITE);

        let upcoming_broken = Event::new("e5", "t", Badge::Upcoming).with_color("#12");
        assert_eq!(upcoming_broken.accent(), Rgb::WHITE);
    }

    #[test]
    fn event_without_badge_does_not_poison_the_list() {
        let json = r#"[{"_id":"e1","badge":"LIVE"},{"_id":"e2","title":"draft"}]"#;
        let events: Vec<Event> = serde_json::from_str(json).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].badge, Badge::Live);
        assert_eq!(events[1].badge, Badge::Other(String::new()));
        assert_eq!(events[1].title, "draft");
    }

    #[test]
    fn event_with_both_id_keys_prefers_underscore_id() {
        let json = r#"{"_id":"e1","id":"e1","badge":"LIVE"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "e1");

        let json = r#"{"id":"virtual","_id":"stored","badge":"LIVE"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "stored");
    }

    #[test]
    fn event_without_any_id_is_rejected() {
        let err = serde_json::from_str::<Event>(r#"{"badge":"LIVE"}"#).unwrap_err();
        assert!(err.to_string().contains("_id"));
    }

    #[test]
    fn event_reads_time_display_and_club_name() {
        let json = r#"{"_id":"e1","badge":"UPCOMING","timeDisplay":"6:30 PM","clubName":"Chess Club"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.time.as_deref(), Some("6:30 PM"));
        assert_eq!(event.club_name.as_deref(), Some("Chess Club"));

        let json = r#"{"_id":"e2","badge":"UPCOMING","time":"18:30","timeDisplay":"6:30 PM"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.time.as_deref(), Some("6:30 PM"));
    }

    #[test]
    fn serialized_event_reads_back() {
        let event = Event::new("e1", "Talk", Badge::Upcoming)
            .with_club("chess")
            .with_club_name("Chess Club")
            .with_time("6:30 PM");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""timeDisplay":"6:30 PM""#));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
