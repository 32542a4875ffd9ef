//! Cache-coherence layer: keeps the per-user timeline cache and the
//! per-location mark cache in step with the entity stores they denormalize.
//! Every function here assumes its caller has already decided *that* a
//! propagation is needed (field changed, nonzero/nonempty) — this module
//! only does the mechanical propagation, one entity lock at a time, never
//! two at once.

use std::sync::Arc;

use tracing::warn;

use super::model::{Gender, LocationId, MarkEntry, TimelineEntry, UserId, Visit, VisitId};
use super::Engine;

/// Materializes a freshly created visit into both caches: a sorted
/// timeline-cache slot on the user, and a mark-cache entry on the location.
pub fn on_visit_created(engine: &Engine, visit: &Visit) {
    let Some((place, country_idx, distance)) = engine
        .locations
        .read(visit.location, |l| (Arc::clone(&l.place), l.country_idx, l.distance))
    else {
        warn!(visit_id = visit.id, location = visit.location, "visit creation: location missing from cache update");
        return;
    };
    engine.users.apply(visit.user, |u| {
        u.insert_timeline_entry(TimelineEntry {
            visit_id: visit.id,
            visited_at: visit.visited_at,
            distance,
            country_idx,
            mark: visit.mark,
            place,
        });
    });

    let Some((gender, birthdate)) = engine.users.read(visit.user, |u| (u.gender, u.birth_date)) else {
        warn!(visit_id = visit.id, user = visit.user, "visit creation: user missing from cache update");
        return;
    };
    engine.locations.apply(visit.location, |l| {
        l.marks.push(MarkEntry {
            visit_id: visit.id,
            visited_at: visit.visited_at,
            birthdate,
            gender,
            mark: visit.mark,
        });
    });
}

/// Denormalized fields of a location that changed in this update, each
/// `None` meaning "unchanged" (gated by the caller on nonzero/nonempty and
/// different-from-current). `city` never propagates — it isn't cached.
#[derive(Debug, Default)]
pub struct LocationDenormChange {
    pub place: Option<Arc<str>>,
    pub country_idx: Option<u32>,
    pub distance: Option<u32>,
}

impl LocationDenormChange {
    pub fn is_empty(&self) -> bool {
        self.place.is_none() && self.country_idx.is_none() && self.distance.is_none()
    }
}

/// Propagates a location update to every timeline entry denormalized from
/// it, found by resolving each of the location's mark entries back to its
/// visit and then to the owning user's timeline.
pub fn on_location_updated(engine: &Engine, location_id: LocationId, change: &LocationDenormChange) {
    if change.is_empty() {
        return;
    }
    let Some(visit_ids) = engine
        .locations
        .read(location_id, |l| l.marks.iter().map(|m| m.visit_id).collect::<Vec<_>>())
    else {
        return;
    };
    for visit_id in visit_ids {
        let Some(user_id) = engine.visits.read(visit_id, |v| v.user) else {
            warn!(visit_id, "location update: visit missing from cache update");
            continue;
        };
        let found = engine.users.apply(user_id, |u| {
            let Some(entry) = u.timeline.iter_mut().find(|e| e.visit_id == visit_id) else {
                return false;
            };
            if let Some(place) = &change.place {
                entry.place = Arc::clone(place);
            }
            if let Some(country_idx) = change.country_idx {
                entry.country_idx = country_idx;
            }
            if let Some(distance) = change.distance {
                entry.distance = distance;
            }
            true
        });
        if found != Some(true) {
            warn!(visit_id, user_id, "location update: timeline entry missing from cache update");
        }
    }
}

/// Denormalized fields of a user that changed; `None` means unchanged.
#[derive(Debug, Default)]
pub struct UserDenormChange {
    pub gender: Option<Gender>,
    pub birth_date: Option<i64>,
}

impl UserDenormChange {
    pub fn is_empty(&self) -> bool {
        self.gender.is_none() && self.birth_date.is_none()
    }
}

/// Propagates a user update to every mark entry denormalized from it,
/// found by resolving each of the user's timeline entries back to its
/// visit and then to the owning location's mark cache.
pub fn on_user_updated(engine: &Engine, user_id: UserId, change: &UserDenormChange) {
    if change.is_empty() {
        return;
    }
    let Some(visit_ids) = engine
        .users
        .read(user_id, |u| u.timeline.iter().map(|e| e.visit_id).collect::<Vec<_>>())
    else {
        return;
    };
    for visit_id in visit_ids {
        let Some(location_id) = engine.visits.read(visit_id, |v| v.location) else {
            warn!(visit_id, "user update: visit missing from cache update");
            continue;
        };
        let found = engine.locations.apply(location_id, |l| {
            let Some(entry) = l.marks.iter_mut().find(|m| m.visit_id == visit_id) else {
                return false;
            };
            if let Some(gender) = change.gender {
                entry.gender = gender;
            }
            if let Some(birth_date) = change.birth_date {
                entry.birthdate = birth_date;
            }
            true
        });
        if found != Some(true) {
            warn!(visit_id, location_id, "user update: mark entry missing from cache update");
        }
    }
}

/// Visit field 1/4: `location_id` changed. Moves the mark entry from the
/// old location to the new one, then refreshes the user's timeline entry
/// with the new location's denormalized fields.
pub fn on_visit_location_changed(
    engine: &Engine,
    visit_id: VisitId,
    user_id: UserId,
    old_location: LocationId,
    new_location: LocationId,
) {
    let Some(mark_entry) = engine
        .locations
        .apply(old_location, |l| l.remove_mark_entry(visit_id))
        .flatten()
    else {
        warn!(visit_id, old_location, "visit relink: mark entry missing on old location");
        return;
    };
    let Some((place, country_idx, distance)) = engine
        .locations
        .read(new_location, |l| (Arc::clone(&l.place), l.country_idx, l.distance))
    else {
        warn!(visit_id, new_location, "visit relink: new location missing");
        return;
    };
    engine.locations.apply(new_location, |l| l.marks.push(mark_entry));

    let found = engine.users.apply(user_id, |u| {
        let Some(entry) = u.timeline.iter_mut().find(|e| e.visit_id == visit_id) else {
            return false;
        };
        entry.place = place;
        entry.country_idx = country_idx;
        entry.distance = distance;
        true
    });
    if found != Some(true) {
        warn!(visit_id, user_id, "visit relink: timeline entry missing on user");
    }
}

/// Visit field 2/4: `user_id` changed. Moves the timeline entry from the
/// old user to the new one (preserving sort order in the destination),
/// then refreshes the location's mark entry with the new user's fields.
pub fn on_visit_user_changed(
    engine: &Engine,
    visit_id: VisitId,
    location_id: LocationId,
    old_user: UserId,
    new_user: UserId,
) {
    let Some(entry) = engine
        .users
        .apply(old_user, |u| u.remove_timeline_entry(visit_id))
        .flatten()
    else {
        warn!(visit_id, old_user, "visit relink: timeline entry missing on old user");
        return;
    };
    engine.users.apply(new_user, |u| u.insert_timeline_entry(entry));

    let Some((gender, birthdate)) = engine.users.read(new_user, |u| (u.gender, u.birth_date)) else {
        warn!(visit_id, new_user, "visit relink: new user missing");
        return;
    };
    let found = engine.locations.apply(location_id, |l| {
        let Some(m) = l.marks.iter_mut().find(|m| m.visit_id == visit_id) else {
            return false;
        };
        m.gender = gender;
        m.birthdate = birthdate;
        true
    });
    if found != Some(true) {
        warn!(visit_id, location_id, "visit relink: mark entry missing on location");
    }
}

/// Visit field 3/4: `visited_at` changed. Updates both denormalized copies
/// and re-sorts the user's timeline entry into its new position.
pub fn on_visit_time_changed(engine: &Engine, visit_id: VisitId, user_id: UserId, location_id: LocationId, new_visited_at: i32) {
    engine.locations.apply(location_id, |l| {
        if let Some(m) = l.marks.iter_mut().find(|m| m.visit_id == visit_id) {
            m.visited_at = new_visited_at;
        }
    });
    engine.users.apply(user_id, |u| u.resort_timeline_entry(visit_id, new_visited_at));
}

/// Visit field 4/4: `mark` changed. Updates both denormalized copies.
pub fn on_visit_mark_changed(engine: &Engine, visit_id: VisitId, user_id: UserId, location_id: LocationId, new_mark: u8) {
    engine.locations.apply(location_id, |l| {
        if let Some(m) = l.marks.iter_mut().find(|m| m.visit_id == visit_id) {
            m.mark = new_mark;
        }
    });
    engine.users.apply(user_id, |u| {
        if let Some(t) = u.timeline.iter_mut().find(|t| t.visit_id == visit_id) {
            t.mark = new_mark;
        }
    });
}
