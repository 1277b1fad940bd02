//! Crawl cache
//!
//! The set of product URLs already processed by earlier runs, persisted as a
//! flat JSON array. URLs are stored in normalized form so tracking parameters
//! do not defeat the skip check.
//!
//! Saving rewrites the whole file: the new contents go to a temporary sibling
//! which is then renamed over the old file. A missing or unreadable file loads
//! as an empty cache.

use crate::url::url_key;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CrawlCache {
    path: PathBuf,
    urls: HashSet<String>,
}

impl CrawlCache {
    /// Loads the cache persisted at `path`
    ///
    /// Never fails: a missing file starts an empty cache and a corrupt one is
    /// logged and treated the same way.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let urls = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Vec<String>>(&contents) {
                Ok(urls) => urls.iter().map(|url| url_key(url)).collect(),
                Err(e) => {
                    tracing::warn!(
                        "Crawl cache {} is unreadable ({}), starting fresh",
                        path.display(),
                        e
                    );
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No crawl cache at {}", path.display());
                HashSet::new()
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read crawl cache {} ({}), starting fresh",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        };

        tracing::info!("Loaded {} cached URLs from {}", urls.len(), path.display());
        Self { path, urls }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(&url_key(url))
    }

    /// Adds a URL; returns false when it was already present
    pub fn insert(&mut self, url: &str) -> bool {
        self.urls.insert(url_key(url))
    }

    pub fn extend<I, S>(&mut self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.urls
            .extend(urls.into_iter().map(|url| url_key(url.as_ref())));
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Cached URLs in sorted order
    pub fn urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.urls.iter().map(String::as_str).collect();
        urls.sort_unstable();
        urls
    }

    pub fn clear(&mut self) {
        self.urls.clear();
    }

    /// Rewrites the persisted file with the current contents
    pub fn save(&self) -> crate::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.urls())?;
        let tmp = self.temp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!("Saved {} cached URLs to {}", self.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "crawl-cache.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
