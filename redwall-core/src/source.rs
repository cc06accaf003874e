use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::http::Fetch;

pub const LISTING_HOST: &str = "https://www.reddit.com";

/// A named feed and the cursor of its next page. `None` means either "not
/// started" or "exhausted"; the listing API does not distinguish the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub cursor: Option<String>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cursor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub source_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub posts: Vec<Post>,
    pub next_cursor: Option<String>,
}

/// One page of one feed. `limit` is advisory.
pub trait SourceClient: Send + Sync {
    fn fetch(&self, source_name: &str, cursor: Option<&str>, limit: usize) -> Result<Page>;
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    after: Option<String>,
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: ChildData,
}

#[derive(Debug, Deserialize)]
struct ChildData {
    id: Option<String>,
    url: String,
    title: String,
}

/// `hot.json` listing client for subreddits.
#[derive(Clone)]
pub struct RedditClient {
    fetch: Arc<dyn Fetch>,
    host: String,
}

impl RedditClient {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self::with_host(fetch, LISTING_HOST)
    }

    pub fn with_host(fetch: Arc<dyn Fetch>, host: &str) -> Self {
        Self {
            fetch,
            host: host.trim_end_matches('/').to_string(),
        }
    }

    pub fn listing_url(&self, source_name: &str, cursor: Option<&str>, limit: usize) -> String {
        let mut url = format!("{}/r/{}/hot.json?limit={}", self.host, source_name, limit);
        if let Some(after) = cursor {
            url.push_str(&format!("&after={after}"));
        }
        url
    }
}

impl SourceClient for RedditClient {
    fn fetch(&self, source_name: &str, cursor: Option<&str>, limit: usize) -> Result<Page> {
        let name = normalize_source_name(source_name)
            .ok_or_else(|| Error::parse("source name", "empty source name"))?;
        let url = self.listing_url(name, cursor, limit);
        let body = self.fetch.get_bytes(&url)?;
        parse_listing(name, &body)
    }
}

/// Accepts `wallpapers`, `r/wallpapers` and `/r/wallpapers/`.
pub fn normalize_source_name(input: &str) -> Option<&str> {
    let name = input.trim().trim_start_matches('/');
    let name = name
        .strip_prefix("r/")
        .or_else(|| name.strip_prefix("R/"))
        .unwrap_or(name)
        .trim_matches('/');
    (!name.is_empty()).then_some(name)
}

pub fn parse_listing(source_name: &str, body: &[u8]) -> Result<Page> {
    let listing: Listing = serde_json::from_slice(body)
        .map_err(|e| Error::parse(format!("r/{source_name} listing"), e))?;

    let posts = listing
        .data
        .children
        .into_iter()
        .map(|child| {
            let ChildData { id, url, title } = child.data;
            Post {
                id: id.unwrap_or_else(|| url.clone()),
                title,
                image_url: url,
                source_name: source_name.to_string(),
            }
        })
        .collect();

    Ok(Page {
        posts,
        next_cursor: listing.data.after.filter(|after| !after.is_empty()),
    })
}
