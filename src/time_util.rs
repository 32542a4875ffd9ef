//! Age-to-timestamp conversion for the `/locations/<id>/avg` query's
//! `fromAge`/`toAge` filters, and the `options.txt` "now" override.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Ages above this are computed directly rather than looked up; the warm
/// cache only covers the range real query traffic actually uses.
const WARM_CACHE_MAX_AGE: u32 = 200;

/// Precomputes the birthdate cutoff for every age 0..=200 relative to a
/// fixed "now", so the hot query path never repeats the calendar
/// arithmetic. Ages outside the cache fall back to computing on demand.
pub struct AgeCutoffTable {
    now: DateTime<Utc>,
    cutoffs: Box<[i64]>,
}

impl AgeCutoffTable {
    pub fn new(now: DateTime<Utc>) -> Self {
        let cutoffs = (0..=WARM_CACHE_MAX_AGE)
            .map(|age| compute_cutoff(now, age))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { now, cutoffs }
    }

    /// Returns the epoch-seconds birthdate cutoff for `age` years before
    /// "now" at midnight UTC: a user born on or before this cutoff is at
    /// least `age` years old today.
    pub fn cutoff(&self, age: u32) -> i64 {
        match self.cutoffs.get(age as usize) {
            Some(&cached) => cached,
            None => compute_cutoff(self.now, age),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

fn compute_cutoff(now: DateTime<Utc>, age: u32) -> i64 {
    let midnight = floor_to_utc_midnight(now);
    let year = midnight.year() - i32::try_from(age).unwrap_or(i32::MAX);
    let date = NaiveDate::from_ymd_opt(year, midnight.month(), midnight.day())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, midnight.month(), 28).expect("Feb 28 always valid"));
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
        .timestamp()
}

/// Floors a timestamp to UTC midnight of the same calendar day.
pub fn floor_to_utc_midnight(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&ts.date_naive().and_hms_opt(0, 0, 0).expect("midnight is valid"))
}

/// Reads the first line of `options.txt` as a decimal Unix timestamp and
/// floors it to UTC midnight; any parse failure or missing file falls back
/// to the wall clock, floored the same way.
pub fn determine_now(options_path: Option<&std::path::Path>) -> DateTime<Utc> {
    let from_file = options_path.and_then(|path| {
        std::fs::read_to_string(path).ok().and_then(|contents| {
            let first_line = contents.lines().next()?;
            first_line.trim().parse::<i64>().ok()
        })
    });
    let seconds = from_file.unwrap_or_else(|| Utc::now().timestamp());
    let dt = Utc.timestamp_opt(seconds, 0).single().unwrap_or_else(Utc::now);
    floor_to_utc_midnight(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
    }

    #[test]
    fn cutoff_subtracts_years() {
        let table = AgeCutoffTable::new(ymd(2024, 6, 15));
        assert_eq!(table.cutoff(30), ymd(1994, 6, 15).timestamp());
    }

    #[test]
    fn cutoff_zero_is_today() {
        let table = AgeCutoffTable::new(ymd(2024, 6, 15));
        assert_eq!(table.cutoff(0), ymd(2024, 6, 15).timestamp());
    }

    #[test]
    fn cutoff_beyond_warm_cache_still_computes() {
        let table = AgeCutoffTable::new(ymd(2024, 6, 15));
        assert_eq!(table.cutoff(250), ymd(1774, 6, 15).timestamp());
    }

    #[test]
    fn floor_strips_time_of_day() {
        let noon = ymd(2024, 3, 1) + chrono::Duration::hours(14) + chrono::Duration::minutes(32);
        assert_eq!(floor_to_utc_midnight(noon), ymd(2024, 3, 1));
    }
}
