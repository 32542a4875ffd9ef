//! Country name dictionary: interns country names to small integer ids.
//! Index 0 is reserved and means "unknown/absent". Expected cardinality is
//! small (~300 countries) so a linear scan under a single lock is
//! deliberate.

use std::sync::RwLock;

pub struct CountryDict {
    names: RwLock<Vec<String>>,
}

impl CountryDict {
    pub fn new() -> Self {
        Self {
            // Index 0 reserved so `find` returning 0 means "not present".
            names: RwLock::new(vec![String::new()]),
        }
    }

    /// Interns `name`, returning its index and whether it was newly
    /// inserted.
    pub fn add(&self, name: &str) -> (u32, bool) {
        let mut names = self.names.write().unwrap();
        if let Some(idx) = names.iter().position(|n| n == name) {
            return (idx as u32, false);
        }
        names.push(name.to_string());
        ((names.len() - 1) as u32, true)
    }

    /// Returns the index of `name`, or 0 if it has never been interned.
    pub fn find(&self, name: &str) -> u32 {
        let names = self.names.read().unwrap();
        names
            .iter()
            .position(|n| n == name)
            .map_or(0, |idx| idx as u32)
    }

    /// Returns the interned name for `idx`, or an empty string if out of
    /// range.
    pub fn get(&self, idx: u32) -> String {
        let names = self.names.read().unwrap();
        names.get(idx as usize).cloned().unwrap_or_default()
    }
}

impl Default for CountryDict {
    fn default() -> Self {
        Self::new()
    }
}
