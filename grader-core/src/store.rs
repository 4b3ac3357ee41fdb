//! Activity store - the in-memory answer key.
//!
//! Built once at startup from line-delimited JSON and never mutated
//! afterwards, so request handlers share it behind an `Arc` without locking.
//! Any malformed, invalid, or duplicate activity aborts construction.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::GraderError;
use crate::models::Activity;

#[derive(Debug, Default)]
pub struct ActivityStore {
    activities: HashMap<String, Activity>,
}

impl ActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert every activity, failing on the first bad one.
    pub fn from_activities<I>(activities: I) -> Result<Self, GraderError>
    where
        I: IntoIterator<Item = Activity>,
    {
        let mut store = Self::new();
        for activity in activities {
            activity.validate()?;
            store.add(activity)?;
        }
        Ok(store)
    }

    /// Parse one activity per line. Blank lines are skipped; line numbers in
    /// errors are 1-based.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, GraderError> {
        let mut store = Self::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let activity: Activity =
                serde_json::from_str(&line).map_err(|source| GraderError::Parse {
                    line: index + 1,
                    source,
                })?;
            activity.validate()?;
            store.add(activity)?;
        }
        Ok(store)
    }

    /// Load the answer key from a `.jsonl` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraderError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let store = Self::from_reader(BufReader::new(file))?;
        tracing::info!(
            path = %path.display(),
            activities = store.len(),
            "Loaded activity store"
        );
        tracing::debug!(
            identifiers = ?store.identifiers().collect::<Vec<_>>(),
            "Activity identifiers"
        );
        Ok(store)
    }

    /// Insert an activity. An existing entry with the same identifier is
    /// kept and the new one is rejected.
    pub fn add(&mut self, activity: Activity) -> Result<(), GraderError> {
        if self.activities.contains_key(&activity.identifier) {
            return Err(GraderError::DuplicateIdentifier(activity.identifier));
        }
        self.activities.insert(activity.identifier.clone(), activity);
        Ok(())
    }

    pub fn get(&self, identifier: &str) -> Result<&Activity, GraderError> {
        self.activities
            .get(identifier)
            .ok_or_else(|| GraderError::NotFound(identifier.to_string()))
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.activities.keys().map(String::as_str)
    }
}
