//! Link collection across a paginated category listing

use crate::adapter::{PageTurn, RetailerAdapter};
use crate::browser::{BrowserError, BrowserSession};
use crate::crawler::pacing::Pacing;
use crate::crawler::retry::{retry, RetryPolicy};
use crate::url::url_key;
use std::collections::HashSet;
use std::fmt;

/// Unique product URLs found in one category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedLinks {
    /// Normalized product URLs in first-seen order, without repeats
    pub urls: Vec<String>,
    /// Listing pages read, including the first
    pub pages_visited: u32,
    /// URLs dropped because an equal URL was already collected
    pub duplicates_removed: usize,
}

/// Why the first listing page produced nothing
#[derive(Debug)]
enum FirstPageError {
    Empty,
    Browser(BrowserError),
}

impl fmt::Display for FirstPageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("no product links on the listing"),
            Self::Browser(e) => write!(f, "{}", e),
        }
    }
}

impl FirstPageError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Browser(e) => e.is_transient(),
        }
    }
}

/// Drives an adapter across the pages of one category listing
#[derive(Debug, Clone)]
pub struct LinkCollector {
    retry: RetryPolicy,
    pacing: Pacing,
}

impl LinkCollector {
    pub fn new(retry: RetryPolicy, pacing: Pacing) -> Self {
        Self { retry, pacing }
    }

    /// Collects the product URLs of the category at `start_url`
    ///
    /// The first page is retried (reloading between attempts) while it errors
    /// or yields no links. Each page turn is retried on transient errors and a
    /// turn that still fails ends the listing. `max_pages` of `None` keeps
    /// paging until the adapter reports the listing exhausted.
    ///
    /// Never fails: a category that yields nothing returns an empty result.
    pub async fn collect(
        &self,
        adapter: &dyn RetailerAdapter,
        session: &dyn BrowserSession,
        start_url: &str,
        max_pages: Option<u32>,
    ) -> CollectedLinks {
        let first = retry(
            &self.retry,
            "first listing page",
            FirstPageError::is_retryable,
            |attempt| async move {
                let links = if attempt == 1 {
                    adapter
                        .extract_product_links(session, Some(start_url))
                        .await
                } else {
                    reload_listing(adapter, session, start_url).await
                }
                .map_err(FirstPageError::Browser)?;

                if links.is_empty() {
                    Err(FirstPageError::Empty)
                } else {
                    Ok(links)
                }
            },
        )
        .await;

        let mut found = match first {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!("Giving up on category {}: {}", start_url, e);
                return CollectedLinks {
                    pages_visited: 1,
                    ..CollectedLinks::default()
                };
            }
        };
        tracing::info!(links = found.len(), "Listing page 1 of {}", start_url);

        let mut pages_visited = 1u32;
        while max_pages.map_or(true, |max| pages_visited < max) {
            self.pacing.pause().await;

            let turn = retry(&self.retry, "next listing page", BrowserError::is_transient, |_| {
                adapter.next_page(session)
            })
            .await;

            match turn {
                Ok(PageTurn::Advanced) => {}
                Ok(PageTurn::Exhausted) => {
                    tracing::debug!("Listing exhausted after {} pages", pages_visited);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Pagination stopped after {} pages: {}", pages_visited, e);
                    break;
                }
            }

            pages_visited += 1;
            match adapter.extract_product_links(session, None).await {
                Ok(links) => {
                    tracing::info!(links = links.len(), "Listing page {}", pages_visited);
                    found.extend(links);
                }
                Err(e) => {
                    tracing::warn!("Failed to read listing page {}: {}", pages_visited, e);
                    break;
                }
            }
        }

        let (urls, duplicates_removed) = dedup(found);
        if duplicates_removed > 0 {
            tracing::debug!("Removed {} duplicate product links", duplicates_removed);
        }

        CollectedLinks {
            urls,
            pages_visited,
            duplicates_removed,
        }
    }
}

async fn reload_listing(
    adapter: &dyn RetailerAdapter,
    session: &dyn BrowserSession,
    start_url: &str,
) -> Result<Vec<String>, BrowserError> {
    match session.reload().await {
        Ok(()) => adapter.extract_product_links(session, None).await,
        Err(e) => {
            tracing::debug!("Reload failed ({}), navigating again", e);
            adapter.extract_product_links(session, Some(start_url)).await
        }
    }
}

/// Keeps the first occurrence of each normalized URL
fn dedup(links: Vec<String>) -> (Vec<String>, usize) {
    let total = links.len();
    let mut seen = HashSet::with_capacity(total);
    let urls: Vec<String> = links
        .into_iter()
        .map(|link| url_key(&link))
        .filter(|key| seen.insert(key.clone()))
        .collect();
    let removed = total - urls.len();
    (urls, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::{ScriptedAdapter, ScriptedEngine};
    use crate::browser::BrowserEngine;
    use std::time::Duration;

    fn collector() -> LinkCollector {
        LinkCollector::new(RetryPolicy::new(3, Duration::from_millis(1)), Pacing::none())
    }

    fn page(prefix: &str, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("https://shop.example/p/{}-{}", prefix, i))
            .collect()
    }

    #[tokio::test]
    async fn test_two_pages_of_five() {
        let adapter = ScriptedAdapter::with_pages(vec![page("a", 5), page("b", 5)]);
        let engine = ScriptedEngine::new();
        let session = engine.new_session().await.unwrap();

        let collected = collector()
            .collect(&adapter, session.as_ref(), "https://shop.example/cat", None)
            .await;

        assert_eq!(collected.urls.len(), 10);
        assert_eq!(collected.pages_visited, 2);
        assert_eq!(collected.duplicates_removed, 0);
    }

    #[tokio::test]
    async fn test_single_page_when_pagination_ends() {
        let adapter = ScriptedAdapter::with_pages(vec![page("a", 5)]);
        let engine = ScriptedEngine::new();
        let session = engine.new_session().await.unwrap();

        let collected = collector()
            .collect(&adapter, session.as_ref(), "https://shop.example/cat", None)
            .await;

        assert_eq!(collected.urls, page("a", 5));
        assert_eq!(collected.pages_visited, 1);
    }

    #[tokio::test]
    async fn test_duplicates_are_removed() {
        let mut second = page("a", 3);
        second.push("https://shop.example/p/a-0?utm_source=grid".to_string());
        second.extend(page("b", 2));
        let adapter = ScriptedAdapter::with_pages(vec![page("a", 3), second]);
        let engine = ScriptedEngine::new();
        let session = engine.new_session().await.unwrap();

        let collected = collector()
            .collect(&adapter, session.as_ref(), "https://shop.example/cat", None)
            .await;

        let distinct: HashSet<_> = collected.urls.iter().collect();
        assert_eq!(distinct.len(), collected.urls.len());
        assert_eq!(collected.urls.len(), 5);
        assert_eq!(collected.duplicates_removed, 4);
    }

    #[tokio::test]
    async fn test_max_pages_stops_paging() {
        let adapter = ScriptedAdapter::with_pages(vec![page("a", 2), page("b", 2), page("c", 2)]);
        let engine = ScriptedEngine::new();
        let session = engine.new_session().await.unwrap();

        let collected = collector()
            .collect(&adapter, session.as_ref(), "https://shop.example/cat", Some(2))
            .await;

        assert_eq!(collected.pages_visited, 2);
        assert_eq!(collected.urls.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_first_page_is_retried_then_abandoned() {
        let adapter = ScriptedAdapter::with_pages(vec![Vec::new()]);
        let engine = ScriptedEngine::new();
        let session = engine.new_session().await.unwrap();

        let collected = collector()
            .collect(&adapter, session.as_ref(), "https://shop.example/cat", None)
            .await;

        assert!(collected.urls.is_empty());
        assert_eq!(adapter.listing_reads(), 3);
    }

    #[tokio::test]
    async fn test_first_page_recovers_after_transient_failure() {
        let adapter = ScriptedAdapter::with_pages(vec![page("a", 2)]).failing_first_listing(1);
        let engine = ScriptedEngine::new();
        let session = engine.new_session().await.unwrap();

        let collected = collector()
            .collect(&adapter, session.as_ref(), "https://shop.example/cat", None)
            .await;

        assert_eq!(collected.urls.len(), 2);
        assert_eq!(adapter.listing_reads(), 2);
    }

    #[tokio::test]
    async fn test_page_turn_recovers_after_transient_failure() {
        let adapter = ScriptedAdapter::with_pages(vec![page("a", 2), page("b", 2)]).failing_next_page(1);
        let engine = ScriptedEngine::new();
        let session = engine.new_session().await.unwrap();

        let collected = collector()
            .collect(&adapter, session.as_ref(), "https://shop.example/cat", None)
            .await;

        assert_eq!(collected.pages_visited, 2);
        assert_eq!(collected.urls.len(), 4);
    }

    #[tokio::test]
    async fn test_failing_page_turn_keeps_first_page() {
        // Three attempts per turn, all of them fail
        let adapter = ScriptedAdapter::with_pages(vec![page("a", 2), page("b", 2)]).failing_next_page(3);
        let engine = ScriptedEngine::new();
        let session = engine.new_session().await.unwrap();

        let collected = collector()
            .collect(&adapter, session.as_ref(), "https://shop.example/cat", None)
            .await;

        assert_eq!(collected.pages_visited, 1);
        assert_eq!(collected.urls, page("a", 2));
    }
}
