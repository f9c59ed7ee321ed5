// -------------------------
// Session cookie cache
// -------------------------
//
// The jar file lets a later run skip re-authentication. Single process,
// single writer; no locking. Anything stale or unreadable reads as absent and
// the run simply starts a fresh session.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::COOKIE_TTL_MS;

/// One persisted browser cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

/// Capture timestamp (epoch millis) plus the cookie records in capture order.
#[derive(Debug, Serialize, Deserialize)]
pub struct CookieJar {
    pub timestamp: i128,
    pub cookies: Vec<SessionCookie>,
}

pub struct SessionCookieCache {
    path: PathBuf,
}

impl SessionCookieCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the persisted jar. Missing, corrupt, and stale (>= 50 min old)
    /// data all read as absent.
    pub fn load(&self) -> Option<CookieJar> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let jar: CookieJar = serde_json::from_str(&raw).ok()?;
        if now_millis() - jar.timestamp >= COOKIE_TTL_MS {
            return None;
        }
        Some(jar)
    }

    /// Overwrite the jar with the given cookie set, stamped now.
    pub fn save(&self, cookies: &[SessionCookie]) -> Result<()> {
        let jar = CookieJar {
            timestamp: now_millis(),
            cookies: cookies.to_vec(),
        };
        let body = serde_json::to_string_pretty(&jar)?;
        fs::write(&self.path, body)
            .with_context(|| format!("failed to write cookie jar: {}", self.path.display()))?;
        Ok(())
    }
}

pub fn now_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(name: &str) -> SessionCookie {
        SessionCookie {
            name: name.to_string(),
            value: "v".to_string(),
            domain: ".wtbmarketlist.eu".to_string(),
            path: "/".to_string(),
            http_only: true,
            secure: true,
        }
    }

    #[test]
    fn fresh_jar_round_trips_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCookieCache::new(dir.path().join("jar.json"));

        cache.save(&[cookie("session"), cookie("csrf")]).unwrap();
        let jar = cache.load().expect("fresh jar should load");
        let names: Vec<&str> = jar.cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["session", "csrf"]);
    }

    #[test]
    fn stale_jar_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jar.json");
        let cache = SessionCookieCache::new(&path);

        let jar = CookieJar {
            timestamp: now_millis() - COOKIE_TTL_MS - 1,
            cookies: vec![cookie("session")],
        };
        fs::write(&path, serde_json::to_string(&jar).unwrap()).unwrap();

        assert!(cache.load().is_none());
    }

    #[test]
    fn jar_just_inside_the_window_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jar.json");
        let cache = SessionCookieCache::new(&path);

        let jar = CookieJar {
            timestamp: now_millis() - COOKIE_TTL_MS + 60_000,
            cookies: vec![cookie("session")],
        };
        fs::write(&path, serde_json::to_string(&jar).unwrap()).unwrap();

        assert!(cache.load().is_some());
    }

    #[test]
    fn missing_and_corrupt_files_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jar.json");
        let cache = SessionCookieCache::new(&path);

        assert!(cache.load().is_none());

        fs::write(&path, "{ not json").unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn save_overwrites_the_previous_jar() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCookieCache::new(dir.path().join("jar.json"));

        cache.save(&[cookie("old")]).unwrap();
        cache.save(&[cookie("new")]).unwrap();

        let jar = cache.load().unwrap();
        assert_eq!(jar.cookies.len(), 1);
        assert_eq!(jar.cookies[0].name, "new");
    }
}
