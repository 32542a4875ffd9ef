//! Entity records and their denormalized caches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// `'m'` or `'f'`; serializes/deserializes as the single-character string
/// the wire format uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_char(self) -> char {
        match self {
            Gender::Male => 'm',
            Gender::Female => 'f',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'm' => Some(Gender::Male),
            'f' => Some(Gender::Female),
            _ => None,
        }
    }
}

impl Serialize for Gender {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_char().to_string())
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut chars = s.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(serde::de::Error::custom("gender must be a single character"));
        };
        Gender::from_char(c).ok_or_else(|| serde::de::Error::custom("gender must be 'm' or 'f'"))
    }
}

pub type UserId = i32;
pub type LocationId = i32;
pub type VisitId = i32;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birth_date: i64,

    #[serde(skip)]
    pub timeline: Vec<TimelineEntry>,
}

/// A per-user timeline entry: a denormalized view of one visit plus the
/// location fields the `/users/<id>/visits` query needs, so that query
/// never touches the location or visit stores. Kept sorted by
/// `visited_at` ascending on the owning [`User`].
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub visit_id: VisitId,
    pub visited_at: i32,
    pub distance: u32,
    pub country_idx: u32,
    pub mark: u8,
    /// Shares the [`Location`]'s `place` allocation; cheap to clone, and
    /// re-pointed in place by the cache-coherence layer when the location's
    /// `place` changes instead of being deep-copied on every denormalize.
    pub place: Arc<str>,
}

/// Unlike [`User`], not `Serialize` directly: the wire format's `country`
/// field is the interned name, not `country_idx`, so serialization needs a
/// country-dictionary lookup the record alone doesn't have (see
/// `dto::LocationView`).
#[derive(Debug, Clone)]
pub struct Location {
    pub id: LocationId,
    pub place: Arc<str>,
    pub country_idx: u32,
    pub city: String,
    pub distance: u32,

    pub marks: Vec<MarkEntry>,
}

/// A per-location mark entry: a denormalized view of one visit plus the
/// visiting user's fields the `/locations/<id>/avg` query needs.
/// Unordered; removed with swap-remove.
#[derive(Debug, Clone)]
pub struct MarkEntry {
    pub visit_id: VisitId,
    pub visited_at: i32,
    pub birthdate: i64,
    pub gender: Gender,
    pub mark: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct Visit {
    pub id: VisitId,
    pub location: LocationId,
    pub user: UserId,
    pub visited_at: i32,
    pub mark: u8,
}

impl User {
    /// Inserts a new timeline entry at the position keeping `timeline`
    /// sorted ascending by `visited_at`.
    pub fn insert_timeline_entry(&mut self, entry: TimelineEntry) {
        let pos = self
            .timeline
            .iter()
            .position(|e| e.visited_at > entry.visited_at)
            .unwrap_or(self.timeline.len());
        self.timeline.insert(pos, entry);
    }

    /// Removes the entry for `visit_id`, preserving order of the rest, and
    /// returns it.
    pub fn remove_timeline_entry(&mut self, visit_id: VisitId) -> Option<TimelineEntry> {
        let pos = self.timeline.iter().position(|e| e.visit_id == visit_id)?;
        Some(self.timeline.remove(pos))
    }

    /// Updates the `visited_at` of an existing entry and re-sorts it into
    /// place without disturbing the relative order of the others.
    pub fn resort_timeline_entry(&mut self, visit_id: VisitId, visited_at: i32) {
        let Some(pos) = self.timeline.iter().position(|e| e.visit_id == visit_id) else {
            return;
        };
        let mut entry = self.timeline.remove(pos);
        entry.visited_at = visited_at;
        self.insert_timeline_entry(entry);
    }
}

impl Location {
    pub fn remove_mark_entry(&mut self, visit_id: VisitId) -> Option<MarkEntry> {
        let pos = self.marks.iter().position(|m| m.visit_id == visit_id)?;
        Some(self.marks.swap_remove(pos))
    }
}
