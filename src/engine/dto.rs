//! Wire-format request and response bodies. Create payloads use required
//! fields so a missing one fails deserialization outright (→ 400 before the
//! engine is even consulted); update payloads use `Option<T>` so serde's
//! default-missing-field-to-`None` behavior gives us field-presence
//! tracking for free, in place of the boolean "setted" flags a
//! non-optional-typed language needs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::country::CountryDict;
use super::model::{Gender, Location, TimelineEntry, User, Visit};

#[derive(Debug, Deserialize)]
pub struct UserCreate {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birth_date: i64,
}

/// `id` is intentionally absent: the wire format rejects an update payload
/// that names it by failing deserialization with `deny_unknown_fields`-like
/// strictness — here, explicitly via [`reject_id_field`].
#[derive(Debug, Deserialize, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub birth_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LocationCreate {
    pub id: i32,
    pub place: String,
    pub country: String,
    pub city: String,
    pub distance: u32,
}

#[derive(Debug, Deserialize, Default)]
pub struct LocationUpdate {
    pub place: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub distance: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct VisitCreate {
    pub id: i32,
    pub location: i32,
    pub user: i32,
    pub visited_at: i32,
    pub mark: u8,
}

#[derive(Debug, Deserialize, Default)]
pub struct VisitUpdate {
    pub location: Option<i32>,
    pub user: Option<i32>,
    pub visited_at: Option<i32>,
    pub mark: Option<u8>,
}

/// Rejects a payload that carries an `id` key at all, update or not — the
/// raw `serde_json::Value` is checked before deserializing into the typed
/// update struct, since the typed struct has no `id` field to catch it.
pub fn body_carries_id(raw: &serde_json::Value) -> bool {
    raw.as_object().is_some_and(|obj| obj.contains_key("id"))
}

#[derive(Debug, Serialize)]
pub struct LocationView {
    pub id: i32,
    pub place: String,
    pub country: String,
    pub city: String,
    pub distance: u32,
}

impl LocationView {
    pub fn from_location(loc: &Location, countries: &CountryDict) -> Self {
        Self {
            id: loc.id,
            place: loc.place.to_string(),
            country: countries.get(loc.country_idx),
            city: loc.city.clone(),
            distance: loc.distance,
        }
    }
}

pub fn user_to_value(user: &User) -> serde_json::Value {
    serde_json::to_value(user).expect("User serialization cannot fail")
}

pub fn visit_to_value(visit: &Visit) -> serde_json::Value {
    serde_json::to_value(visit).expect("Visit serialization cannot fail")
}

#[derive(Debug, Serialize)]
pub struct TimelineVisit {
    pub mark: u8,
    pub visited_at: i32,
    pub place: Arc<str>,
}

impl From<&TimelineEntry> for TimelineVisit {
    fn from(entry: &TimelineEntry) -> Self {
        Self {
            mark: entry.mark,
            visited_at: entry.visited_at,
            place: Arc::clone(&entry.place),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VisitsResponse {
    pub visits: Vec<TimelineVisit>,
}

/// `{"avg": X.XXXXX}` — exactly five fractional digits, serialized as a
/// bare JSON number (not a string) by routing through `serde_json::Number`
/// built from the preformatted text. Relies on the `arbitrary_precision`
/// feature: without it `Number` is f64-backed and re-serializes through
/// ryu, which drops the trailing zeros this format requires.
#[derive(Debug)]
pub struct AvgResponse {
    pub avg: f64,
}

impl Serialize for AvgResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        let formatted = format!("{:.5}", self.avg);
        let number: serde_json::Number = formatted
            .parse()
            .map_err(|_| serde::ser::Error::custom("avg did not format to a valid number"))?;
        map.serialize_entry("avg", &number)?;
        map.end()
    }
}

pub fn gender_from_str(s: &str) -> Option<Gender> {
    let mut chars = s.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };
    Gender::from_char(c)
}
