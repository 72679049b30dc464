//! Where candidate items come from.
//!
//! The coordinator only needs an id per item and a pagination cursor. The
//! [`ItemSource`] trait models a paginated listing (search results in the
//! browser); [`StaticSource`] serves a job file loaded from disk.

use std::path::Path;

use serde::Deserialize;

use crate::coordinator::{Item, Page};
use crate::error::SourceError;

#[allow(async_fn_in_trait)]
pub trait ItemSource {
    /// Fetches page `page` (zero-based).
    async fn page(&self, page: u32) -> Result<Page, SourceError>;
}

/// Serves a fixed list of items in pages of `page_size`.
#[derive(Debug, Clone)]
pub struct StaticSource {
    items: Vec<Item>,
    page_size: usize,
}

impl StaticSource {
    pub fn new(items: Vec<Item>, page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
        }
    }

    pub fn from_file(path: &Path, page_size: usize) -> Result<Self, SourceError> {
        Ok(Self::new(load_items(path)?, page_size))
    }
}

impl ItemSource for StaticSource {
    async fn page(&self, page: u32) -> Result<Page, SourceError> {
        let start = (page as usize).saturating_mul(self.page_size);
        if start >= self.items.len() {
            return Ok(Page::default());
        }
        let end = (start + self.page_size).min(self.items.len());
        Ok(Page {
            items: self.items[start..end].to_vec(),
            has_more: end < self.items.len(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct JobFile {
    #[serde(default)]
    jobs: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonJobs {
    List(Vec<Item>),
    File(JobFile),
}

/// Loads items from a `.json` or `.toml` job file.
///
/// JSON accepts either a bare array of items or `{"jobs": [...]}`; TOML
/// expects `[[jobs]]` tables.
pub fn load_items(path: &Path) -> Result<Vec<Item>, SourceError> {
    let contents = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    parse_items(&contents, &extension)
}

fn parse_items(contents: &str, extension: &str) -> Result<Vec<Item>, SourceError> {
    let items = match extension {
        "json" => match serde_json::from_str::<JsonJobs>(contents)
            .map_err(|e| SourceError::Parse(e.to_string()))?
        {
            JsonJobs::List(items) => items,
            JsonJobs::File(file) => file.jobs,
        },
        "toml" => {
            toml::from_str::<JobFile>(contents)
                .map_err(|e| SourceError::Parse(e.to_string()))?
                .jobs
        }
        other => return Err(SourceError::UnsupportedFormat(other.to_string())),
    };

    if let Some(index) = items.iter().position(|item| item.id.trim().is_empty()) {
        return Err(SourceError::EmptyId { index });
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item::new(format!("job-{i}"))).collect()
    }

    #[tokio::test]
    async fn pages_split_by_page_size() {
        let source = StaticSource::new(items(5), 2);

        let p0 = source.page(0).await.unwrap();
        assert_eq!(p0.items.len(), 2);
        assert!(p0.has_more);

        let p2 = source.page(2).await.unwrap();
        assert_eq!(p2.items, vec![Item::new("job-4")]);
        assert!(!p2.has_more);

        let p3 = source.page(3).await.unwrap();
        assert!(p3.items.is_empty());
        assert!(!p3.has_more);
    }

    #[tokio::test]
    async fn zero_page_size_is_clamped() {
        let source = StaticSource::new(items(2), 0);
        let p0 = source.page(0).await.unwrap();
        assert_eq!(p0.items.len(), 1);
        assert!(p0.has_more);
    }

    #[test]
    fn parse_json_array_and_object() {
        let list = parse_items(r#"[{"id":"a"},{"id":"b","title":"Rust Dev"}]"#, "json").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].title.as_deref(), Some("Rust Dev"));

        let wrapped = parse_items(r#"{"jobs":[{"id":"a","url":"https://x/1"}]}"#, "json").unwrap();
        assert_eq!(wrapped[0].url.as_deref(), Some("https://x/1"));
    }

    #[test]
    fn parse_toml_jobs() {
        let toml_str = r#"
            [[jobs]]
            id = "li-1"
            company = "Acme"

            [[jobs]]
            id = "li-2"
        "#;
        let items = parse_items(toml_str, "toml").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].company.as_deref(), Some("Acme"));
    }

    #[test]
    fn rejects_empty_ids_and_unknown_formats() {
        assert!(matches!(
            parse_items(r#"[{"id":"a"},{"id":"  "}]"#, "json"),
            Err(SourceError::EmptyId { index: 1 })
        ));
        assert!(matches!(
            parse_items("", "yaml"),
            Err(SourceError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
        assert!(matches!(parse_items("not json", "json"), Err(SourceError::Parse(_))));
    }

    #[test]
    fn load_items_reads_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"id":"from-disk"}}]"#).unwrap();
        let items = load_items(file.path()).unwrap();
        assert_eq!(items, vec![Item::new("from-disk")]);
    }
}
