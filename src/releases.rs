//! CPython release list.
//!
//! Release tags come from the GitHub tags API and are cached on disk for a day, so the
//! settings panel can offer versions without hitting the network on every request.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const TAGS_URL: &str = "https://api.github.com/repos/python/cpython/tags?per_page=100";
const RELEASES_TTL: Duration = Duration::from_secs(60 * 60 * 24);
const RELEASES_CACHE_FILE: &str = "cpython-tags.json";
const NO_NETWORK_ENV: &str = "PYCREATOR_NO_NETWORK";

#[derive(Debug, Deserialize)]
struct TagResponse {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReleasesCache {
    checked_at: u64,
    releases: Vec<String>,
}

/// Returns release versions (`3.12.1`, `3.13.0rc2`, ...), from the cache when it is fresh.
pub async fn fetch_releases() -> Result<Vec<String>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before 1970")?
        .as_secs();
    let cache_path = cache_path();
    let cached = cache_path.as_deref().and_then(read_cache);
    if let Some(cache) = &cached {
        if now.saturating_sub(cache.checked_at) < RELEASES_TTL.as_secs() {
            log::debug!("using cached CPython releases");
            return Ok(cache.releases.clone());
        }
    }
    if network_disabled() {
        return match cached {
            Some(cache) => Ok(cache.releases),
            None => bail!("network access disabled by {}", NO_NETWORK_ENV),
        };
    }

    match fetch_tags().await {
        Ok(releases) => {
            if let Some(path) = cache_path.as_deref() {
                write_cache(path, &releases, now);
            }
            Ok(releases)
        }
        Err(err) => match cached {
            Some(cache) => {
                log::warn!("release fetch failed, using stale cache: {:#}", err);
                Ok(cache.releases)
            }
            None => Err(err),
        },
    }
}

async fn fetch_tags() -> Result<Vec<String>> {
    let client = reqwest::Client::builder()
        .user_agent(format!("pycreator/{}", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .build()
        .context("failed to build HTTP client")?;
    let response = client
        .get(TAGS_URL)
        .header("Accept", "application/vnd.github+json")
        .send()
        .await
        .context("failed to reach api.github.com")?;
    if !response.status().is_success() {
        bail!("GitHub answered {}", response.status());
    }
    let tags: Vec<TagResponse> = response
        .json()
        .await
        .context("unexpected tags payload")?;
    Ok(release_names(tags.into_iter().map(|tag| tag.name)))
}

/// Keeps `v`-prefixed tags, without the prefix, in the order given.
fn release_names<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    tags.into_iter()
        .filter_map(|tag| {
            let version = tag.strip_prefix('v')?;
            version
                .starts_with(|c: char| c.is_ascii_digit())
                .then(|| version.to_string())
        })
        .collect()
}

fn network_disabled() -> bool {
    env::var(NO_NETWORK_ENV)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn cache_path() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("pycreator").join(RELEASES_CACHE_FILE))
}

fn cache_dir() -> Option<PathBuf> {
    if let Ok(path) = env::var("XDG_CACHE_HOME") {
        return Some(PathBuf::from(path));
    }
    if cfg!(windows) {
        return env::var("LOCALAPPDATA").ok().map(PathBuf::from);
    }
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".cache"))
}

fn read_cache(path: &Path) -> Option<ReleasesCache> {
    let data = fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

fn write_cache(path: &Path, releases: &[String], checked_at: u64) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let cache = ReleasesCache {
        checked_at,
        releases: releases.to_vec(),
    };
    if let Ok(serialized) = serde_json::to_string(&cache) {
        if let Err(err) = fs::write(path, serialized) {
            log::debug!("cannot write {}: {}", path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_names_keep_version_tags() {
        let tags = ["v3.12.1", "v3.13.0rc2", "legacy-trunk", "v", "vabc", "3.11.0"]
            .iter()
            .map(|s| s.to_string());
        assert_eq!(release_names(tags), vec!["3.12.1", "3.13.0rc2"]);
    }

    #[test]
    fn cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(RELEASES_CACHE_FILE);
        write_cache(&path, &["3.12.1".to_string()], 42);
        let cache = read_cache(&path).unwrap();
        assert_eq!(cache.checked_at, 42);
        assert_eq!(cache.releases, vec!["3.12.1"]);
    }

    #[test]
    fn unreadable_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RELEASES_CACHE_FILE);
        fs::write(&path, "not json").unwrap();
        assert!(read_cache(&path).is_none());
    }
}
