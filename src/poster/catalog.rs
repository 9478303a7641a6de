//! Remote wallpaper catalog boundary
//!
//! Fetching is left to a [`CatalogSource`] implementation; this module only
//! carries the item model and the list operations the app performs on it.

use crate::exceptions::Result;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Catalog a wallpaper comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperType {
    Custom,
    Apple,
    Template,
}

impl WallpaperType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WallpaperType::Custom => "custom",
            WallpaperType::Apple => "apple",
            WallpaperType::Template => "template",
        }
    }
}

/// One downloadable wallpaper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    pub preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<WallpaperType>,
}

impl CatalogItem {
    pub fn preview_is_gif(&self) -> bool {
        self.preview.ends_with(".gif")
    }

    /// Absolute download URL, resolving relative entries against `server`
    pub fn download_url(&self, server: &str) -> String {
        if self.url.starts_with("https://") {
            self.url.clone()
        } else {
            format!("{server}{}", self.url)
        }
    }
}

/// Display ordering of a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Random,
    Newest,
    Oldest,
}

/// Reorder a catalog. The catalog is stored oldest first.
pub fn filter(items: &[CatalogItem], filter: FilterType) -> Vec<CatalogItem> {
    let mut filtered = items.to_vec();
    match filter {
        FilterType::Oldest => {}
        FilterType::Newest => filtered.reverse(),
        FilterType::Random => filtered.shuffle(&mut rand::thread_rng()),
    }
    filtered
}

/// File name of a catalog on the server
pub fn catalog_file_name(kind: WallpaperType) -> String {
    format!("wallpapers-{}.json", kind.as_str())
}

/// Parse a catalog document, tagging every item with its kind
pub fn parse_catalog(data: &str, kind: WallpaperType) -> Result<Vec<CatalogItem>> {
    let mut items: Vec<CatalogItem> = serde_json::from_str(data)?;
    for item in &mut items {
        item.kind = Some(kind);
    }
    Ok(items)
}

/// Last path segment of a URL, used as the local file name
pub fn file_name_from_url(url: &str) -> String {
    url.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

/// Where catalogs and bundles come from
pub trait CatalogSource {
    fn fetch_catalog(&self, kind: WallpaperType) -> Result<Vec<CatalogItem>>;

    /// Download `url` to a local file, returning its path
    fn download_file(&self, url: &str) -> Result<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"name": "One", "url": "one.tendies", "preview": "one.png"},
        {"name": "Two", "url": "https://cdn/two.tendies", "preview": "two.gif", "authors": "me"}
    ]"#;

    #[test]
    fn test_parse_catalog() {
        let items = parse_catalog(CATALOG, WallpaperType::Template).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.kind == Some(WallpaperType::Template)));
        assert!(items[1].preview_is_gif());
        assert_eq!(items[0].download_url("https://srv/"), "https://srv/one.tendies");
        assert_eq!(items[1].download_url("https://srv/"), "https://cdn/two.tendies");
    }

    #[test]
    fn test_filter() {
        let items = parse_catalog(CATALOG, WallpaperType::Custom).unwrap();
        assert_eq!(filter(&items, FilterType::Newest)[0].name, "Two");
        assert_eq!(filter(&items, FilterType::Oldest)[0].name, "One");
        assert_eq!(filter(&items, FilterType::Random).len(), 2);
    }

    #[test]
    fn test_names() {
        assert_eq!(catalog_file_name(WallpaperType::Apple), "wallpapers-apple.json");
        assert_eq!(file_name_from_url("https://host/a/Cool.tendies"), "Cool.tendies");
        assert_eq!(file_name_from_url(""), "Unknown");
    }
}
