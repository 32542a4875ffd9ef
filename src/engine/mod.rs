//! The in-memory data engine: three entity stores, the country dictionary
//! they all reference, and the cache-coherence + query operations that
//! sit on top. Owned once, handed to every request handler by reference —
//! there are no ambient singletons.

pub mod cache;
pub mod country;
pub mod dto;
pub mod model;
pub mod query;
pub mod store;

use std::sync::Arc;

pub use country::CountryDict;
use model::{Location, LocationId, User, UserId, Visit, VisitId};
use store::Store;

use crate::time_util::AgeCutoffTable;

/// Ids below these thresholds get a dense preallocated slot; everything
/// else falls into the overflow map.
pub const USER_DENSE_CAPACITY: usize = 1_200_000;
pub const LOCATION_DENSE_CAPACITY: usize = 800_000;
pub const VISIT_DENSE_CAPACITY: usize = 12_000_000;

pub struct Engine {
    pub countries: CountryDict,
    pub users: Store<User>,
    pub locations: Store<Location>,
    pub visits: Store<Visit>,
}

/// Why an entity operation didn't go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Create payload reused an id already occupied.
    Duplicate,
    /// Update or query target id doesn't exist.
    NotFound,
    /// Update payload violated a field constraint (bad gender, mark out
    /// of range, or named `id`).
    Invalid(String),
}

impl Engine {
    pub fn new() -> Self {
        Self::with_dense_capacities(USER_DENSE_CAPACITY, LOCATION_DENSE_CAPACITY, VISIT_DENSE_CAPACITY)
    }

    /// Builds an engine with custom dense-slot capacities per store;
    /// production uses [`Engine::new`], tests use small capacities so a
    /// fixture-sized run doesn't allocate megabytes of unused slots.
    pub fn with_dense_capacities(users: usize, locations: usize, visits: usize) -> Self {
        Self {
            countries: CountryDict::new(),
            users: Store::new(users),
            locations: Store::new(locations),
            visits: Store::new(visits),
        }
    }

    pub fn create_user(&self, create: dto::UserCreate) -> Result<(), EngineError> {
        let user = User {
            id: create.id,
            email: create.email,
            first_name: create.first_name,
            last_name: create.last_name,
            gender: create.gender,
            birth_date: create.birth_date,
            timeline: Vec::new(),
        };
        if self.users.add(create.id, user) {
            Ok(())
        } else {
            Err(EngineError::Duplicate)
        }
    }

    pub fn create_location(&self, create: dto::LocationCreate) -> Result<(), EngineError> {
        let (country_idx, _) = self.countries.add(&create.country);
        let location = Location {
            id: create.id,
            place: Arc::from(create.place.as_str()),
            country_idx,
            city: create.city,
            distance: create.distance,
            marks: Vec::new(),
        };
        if self.locations.add(create.id, location) {
            Ok(())
        } else {
            Err(EngineError::Duplicate)
        }
    }

    pub fn create_visit(&self, create: dto::VisitCreate) -> Result<(), EngineError> {
        if create.mark > 5 {
            return Err(EngineError::Invalid("mark must be 0..=5".into()));
        }
        if !self.users.contains(create.user) {
            return Err(EngineError::Invalid("unknown user".into()));
        }
        if !self.locations.contains(create.location) {
            return Err(EngineError::Invalid("unknown location".into()));
        }
        let visit = Visit {
            id: create.id,
            location: create.location,
            user: create.user,
            visited_at: create.visited_at,
            mark: create.mark,
        };
        if !self.visits.add(create.id, visit.clone()) {
            return Err(EngineError::Duplicate);
        }
        cache::on_visit_created(self, &visit);
        Ok(())
    }

    pub fn update_user(&self, id: UserId, update: dto::UserUpdate) -> Result<(), EngineError> {
        if !self.users.contains(id) {
            return Err(EngineError::NotFound);
        }
        let mut change = cache::UserDenormChange::default();
        self.users.apply(id, |u| {
            if let Some(email) = update.email {
                if !email.is_empty() {
                    u.email = email;
                }
            }
            if let Some(first_name) = update.first_name {
                if !first_name.is_empty() {
                    u.first_name = first_name;
                }
            }
            if let Some(last_name) = update.last_name {
                if !last_name.is_empty() {
                    u.last_name = last_name;
                }
            }
            if let Some(gender) = update.gender {
                if gender != u.gender {
                    u.gender = gender;
                    change.gender = Some(gender);
                }
            }
            if let Some(birth_date) = update.birth_date {
                if birth_date != u.birth_date {
                    u.birth_date = birth_date;
                    change.birth_date = Some(birth_date);
                }
            }
        });
        cache::on_user_updated(self, id, &change);
        Ok(())
    }

    pub fn update_location(&self, id: LocationId, update: dto::LocationUpdate) -> Result<(), EngineError> {
        if !self.locations.contains(id) {
            return Err(EngineError::NotFound);
        }
        let mut change = cache::LocationDenormChange::default();
        self.locations.apply(id, |l| {
            if let Some(place) = update.place {
                if !place.is_empty() && place.as_str() != &*l.place {
                    let shared: Arc<str> = Arc::from(place.as_str());
                    l.place = Arc::clone(&shared);
                    change.place = Some(shared);
                }
            }
            if let Some(country) = &update.country {
                if !country.is_empty() {
                    let (idx, _) = self.countries.add(country);
                    if idx != l.country_idx {
                        l.country_idx = idx;
                        change.country_idx = Some(idx);
                    }
                }
            }
            if let Some(city) = update.city {
                if !city.is_empty() {
                    l.city = city;
                }
            }
            if let Some(distance) = update.distance {
                if distance != 0 && distance != l.distance {
                    l.distance = distance;
                    change.distance = Some(distance);
                }
            }
        });
        cache::on_location_updated(self, id, &change);
        Ok(())
    }

    pub fn update_visit(&self, id: VisitId, update: dto::VisitUpdate) -> Result<(), EngineError> {
        // Existence is probed before field-level validation: a structurally
        // valid body against a missing id is a 404, not a 400.
        let Some((old_location, old_user)) = self.visits.read(id, |v| (v.location, v.user)) else {
            return Err(EngineError::NotFound);
        };
        if let Some(mark) = update.mark {
            if mark > 5 {
                return Err(EngineError::Invalid("mark must be 0..=5".into()));
            }
        }

        if let Some(new_location) = update.location {
            if new_location != 0 && new_location != old_location {
                if !self.locations.contains(new_location) {
                    return Err(EngineError::Invalid("unknown location".into()));
                }
                self.visits.apply(id, |v| v.location = new_location);
                cache::on_visit_location_changed(self, id, old_user, old_location, new_location);
            }
        }
        let location_now = self.visits.read(id, |v| v.location).unwrap_or(old_location);

        if let Some(new_user) = update.user {
            if new_user != 0 && new_user != old_user {
                if !self.users.contains(new_user) {
                    return Err(EngineError::Invalid("unknown user".into()));
                }
                self.visits.apply(id, |v| v.user = new_user);
                cache::on_visit_user_changed(self, id, location_now, old_user, new_user);
            }
        }
        let user_now = self.visits.read(id, |v| v.user).unwrap_or(old_user);

        if let Some(visited_at) = update.visited_at {
            if visited_at != 0 && self.visits.read(id, |v| v.visited_at) != Some(visited_at) {
                self.visits.apply(id, |v| v.visited_at = visited_at);
                cache::on_visit_time_changed(self, id, user_now, location_now, visited_at);
            }
        }

        if let Some(mark) = update.mark {
            if self.visits.read(id, |v| v.mark) != Some(mark) {
                self.visits.apply(id, |v| v.mark = mark);
                cache::on_visit_mark_changed(self, id, user_now, location_now, mark);
            }
        }

        Ok(())
    }

    pub fn contains_user(&self, id: UserId) -> bool {
        self.users.contains(id)
    }

    pub fn contains_location(&self, id: LocationId) -> bool {
        self.locations.contains(id)
    }

    pub fn contains_visit(&self, id: VisitId) -> bool {
        self.visits.contains(id)
    }

    pub fn get_user(&self, id: UserId) -> Option<User> {
        self.users.read(id, Clone::clone)
    }

    pub fn get_location(&self, id: LocationId) -> Option<Location> {
        self.locations.read(id, Clone::clone)
    }

    pub fn get_visit(&self, id: VisitId) -> Option<Visit> {
        self.visits.read(id, Clone::clone)
    }

    pub fn user_visits(&self, id: UserId, filter: &query::UserVisitsFilter) -> Option<dto::VisitsResponse> {
        query::user_visits(self, id, filter)
    }

    pub fn location_avg(
        &self,
        id: LocationId,
        filter: &query::LocationAvgFilter,
        ages: &AgeCutoffTable,
    ) -> Option<dto::AvgResponse> {
        query::location_avg(self, id, filter, ages)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
