//! The two aggregate queries (C6): both are linear scans over a single
//! cache and never touch the visit store.

use super::dto::{AvgResponse, TimelineVisit, VisitsResponse};
use super::model::{Gender, LocationId, UserId};
use super::Engine;
use crate::time_util::AgeCutoffTable;

/// A filter value of `None` means "no constraint" — callers are expected
/// to have already folded an absent-or-zero query parameter into `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserVisitsFilter {
    pub from_date: Option<i32>,
    pub to_date: Option<i32>,
    pub country_idx: Option<u32>,
    pub to_distance: Option<u32>,
}

/// Returns `None` if `user_id` is unknown (→ 404 at the dispatcher).
pub fn user_visits(engine: &Engine, user_id: UserId, filter: &UserVisitsFilter) -> Option<VisitsResponse> {
    engine.users.read(user_id, |u| {
        let visits = u
            .timeline
            .iter()
            .filter(|e| filter.from_date.map_or(true, |f| e.visited_at > f))
            .filter(|e| filter.to_date.map_or(true, |t| e.visited_at < t))
            // index 0 is the "unknown/absent" sentinel in the country
            // dictionary, never a real country — an unresolvable `country`
            // query param folds to `Some(0)` here and must match nothing,
            // not every location with no interned country.
            .filter(|e| filter.country_idx.map_or(true, |c| c != 0 && e.country_idx == c))
            .filter(|e| filter.to_distance.map_or(true, |d| e.distance < d))
            .map(TimelineVisit::from)
            .collect();
        VisitsResponse { visits }
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocationAvgFilter {
    pub from_date: Option<i32>,
    pub to_date: Option<i32>,
    pub from_age: Option<u32>,
    pub to_age: Option<u32>,
    pub gender: Option<Gender>,
}

/// Returns `None` if `location_id` is unknown (→ 404 at the dispatcher).
pub fn location_avg(
    engine: &Engine,
    location_id: LocationId,
    filter: &LocationAvgFilter,
    ages: &AgeCutoffTable,
) -> Option<AvgResponse> {
    // fromAge keeps only users older than fromAge: birthdate <= cutoff(fromAge).
    // toAge keeps only users younger than toAge: birthdate >= cutoff(toAge).
    let from_cutoff = filter.from_age.map(|age| ages.cutoff(age));
    let to_cutoff = filter.to_age.map(|age| ages.cutoff(age));

    engine.locations.read(location_id, |loc| {
        let marks: Vec<u8> = loc
            .marks
            .iter()
            .filter(|m| filter.from_date.map_or(true, |f| m.visited_at > f))
            .filter(|m| filter.to_date.map_or(true, |t| m.visited_at < t))
            .filter(|m| from_cutoff.map_or(true, |c| m.birthdate <= c))
            .filter(|m| to_cutoff.map_or(true, |c| m.birthdate >= c))
            .filter(|m| filter.gender.map_or(true, |g| m.gender == g))
            .map(|m| m.mark)
            .collect();

        let avg = if marks.is_empty() {
            0.0
        } else {
            let sum: u32 = marks.iter().map(|&m| u32::from(m)).sum();
            (f64::from(sum) / marks.len() as f64) + 1e-10
        };
        AvgResponse { avg }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::model::{Location, MarkEntry, TimelineEntry, User};
    use std::sync::Arc;

    fn test_engine() -> Engine {
        Engine::with_dense_capacities(16, 16, 16)
    }

    #[test]
    fn user_visits_filters_by_distance_and_country() {
        let engine = test_engine();
        engine.users.add(
            1,
            User {
                id: 1,
                email: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                gender: Gender::Male,
                birth_date: 0,
                timeline: vec![
                    TimelineEntry {
                        visit_id: 100,
                        visited_at: 100,
                        distance: 5,
                        country_idx: 1,
                        mark: 3,
                        place: Arc::from("A"),
                    },
                    TimelineEntry {
                        visit_id: 101,
                        visited_at: 200,
                        distance: 50,
                        country_idx: 2,
                        mark: 4,
                        place: Arc::from("B"),
                    },
                ],
            },
        );

        let filter = UserVisitsFilter {
            to_distance: Some(10),
            ..Default::default()
        };
        let result = user_visits(&engine, 1, &filter).unwrap();
        assert_eq!(result.visits.len(), 1);
        assert_eq!(result.visits[0].visited_at, 100);
    }

    #[test]
    fn user_visits_unresolved_country_matches_nothing() {
        let engine = test_engine();
        engine.users.add(
            1,
            User {
                id: 1,
                email: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                gender: Gender::Male,
                birth_date: 0,
                timeline: vec![TimelineEntry {
                    visit_id: 100,
                    visited_at: 100,
                    distance: 5,
                    country_idx: 0,
                    mark: 3,
                    place: Arc::from("A"),
                }],
            },
        );

        let filter = UserVisitsFilter { country_idx: Some(0), ..Default::default() };
        let result = user_visits(&engine, 1, &filter).unwrap();
        assert!(result.visits.is_empty());
    }

    #[test]
    fn user_visits_missing_user_returns_none() {
        let engine = test_engine();
        assert!(user_visits(&engine, 99, &UserVisitsFilter::default()).is_none());
    }

    #[test]
    fn location_avg_with_age_filter() {
        let engine = test_engine();
        let ages = AgeCutoffTable::new(chrono::Utc::now());
        engine.locations.add(
            10,
            Location {
                id: 10,
                place: Arc::from("Loc"),
                country_idx: 0,
                city: String::new(),
                distance: 0,
                marks: vec![
                    MarkEntry {
                        visit_id: 1,
                        visited_at: 0,
                        birthdate: ages.cutoff(40) - 1,
                        gender: Gender::Male,
                        mark: 5,
                    },
                    MarkEntry {
                        visit_id: 2,
                        visited_at: 0,
                        birthdate: ages.cutoff(10),
                        gender: Gender::Female,
                        mark: 3,
                    },
                ],
            },
        );

        let filter = LocationAvgFilter {
            from_age: Some(30),
            ..Default::default()
        };
        let result = location_avg(&engine, 10, &filter, &ages).unwrap();
        assert!((result.avg - 5.0).abs() < 1e-6);
    }

    #[test]
    fn location_avg_empty_is_zero() {
        let engine = test_engine();
        let ages = AgeCutoffTable::new(chrono::Utc::now());
        engine.locations.add(
            20,
            Location {
                id: 20,
                place: Arc::from("Empty"),
                country_idx: 0,
                city: String::new(),
                distance: 0,
                marks: vec![],
            },
        );
        let result = location_avg(&engine, 20, &LocationAvgFilter::default(), &ages).unwrap();
        assert_eq!(format!("{:.5}", result.avg), "0.00000");
    }
}
