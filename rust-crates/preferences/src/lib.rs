//! Small client-side preferences persisted as JSON next to the user's config.
//!
//! Only one preference exists today: whether the intro walkthrough has been
//! seen. The flag expires so returning users eventually get a refresher.

use anyhow::{
    Context,
    Result,
};
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const VISIT_FLAG_DAYS: i64 = 365;
pub const DEFAULT_FILE_NAME: &str = "preferences.json";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredPreferences {
    #[serde(default)]
    pub has_visited: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredPreferences {
    pub fn visit_is_current(&self, now: DateTime<Utc>) -> bool {
        self.has_visited && self.expires_at.is_some_and(|expires| now < expires)
    }
}

#[derive(Debug)]
pub struct VisitStore {
    path: PathBuf,
}

impl VisitStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or empty file means a first visit.
    pub fn load(&self) -> Result<StoredPreferences> {
        if !self.path.exists() {
            return Ok(StoredPreferences::default());
        }
        let data = fs::read(&self.path).with_context(|| {
            format!("Failed to read preferences at {}", self.path.display())
        })?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoredPreferences::default());
        }
        serde_json::from_slice(&data).with_context(|| {
            format!("Failed to parse preferences at {}", self.path.display())
        })
    }

    pub fn has_visited(&self, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.load()?.visit_is_current(now))
    }

    /// Marks the intro as seen for the next [`VISIT_FLAG_DAYS`] days.
    pub fn record_visit(&self, now: DateTime<Utc>) -> Result<()> {
        let mut prefs = self.load().unwrap_or_default();
        prefs.has_visited = true;
        prefs.expires_at = Some(now + TimeDelta::days(VISIT_FLAG_DAYS));
        self.save(&prefs)
    }

    fn save(&self, prefs: &StoredPreferences) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preferences directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_vec_pretty(prefs)
            .context("Failed to serialize preferences")?;
        fs::write(&self.path, json).with_context(|| {
            format!("Failed to write preferences to {}", self.path.display())
        })
    }
}
