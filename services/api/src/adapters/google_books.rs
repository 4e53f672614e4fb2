//! services/api/src/adapters/google_books.rs
//!
//! The `BookCatalog` port over the public Google Books volumes API.

use async_trait::async_trait;
use inkkeeper_core::ports::{BookCatalog, CatalogBook, PortError, PortResult};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

const USER_AGENT: &str = "inkkeeper-api";

/// Looks titles up in Google Books. No key is needed for public volume search.
#[derive(Clone)]
pub struct GoogleBooksAdapter {
    client: Client,
    base_url: String,
}

impl GoogleBooksAdapter {
    /// `base_url` is the API root, e.g. `https://www.googleapis.com/books/v1`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize, Default)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Deserialize, Default)]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(rename = "pageCount")]
    page_count: Option<i64>,
    #[serde(rename = "imageLinks")]
    image_links: Option<ImageLinks>,
}

#[derive(Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

impl VolumeInfo {
    fn to_domain(self) -> CatalogBook {
        CatalogBook {
            title: self.title,
            authors: self.authors,
            cover_url: self.image_links.and_then(|links| links.thumbnail),
            page_count: self
                .page_count
                .filter(|&n| n > 0)
                .and_then(|n| u32::try_from(n).ok()),
        }
    }
}

fn parse_volumes(body: &str) -> Result<Vec<CatalogBook>, serde_json::Error> {
    let response: VolumesResponse = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .map(|v| v.volume_info.to_domain())
        .collect())
}

#[async_trait]
impl BookCatalog for GoogleBooksAdapter {
    async fn search(&self, query: &str) -> PortResult<Vec<CatalogBook>> {
        let url = format!("{}/volumes", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query)])
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| {
                error!("Book search request failed: {}", e);
                PortError::Backend(format!("Book search failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(PortError::Backend(format!(
                "Book search failed: HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PortError::Backend(format!("Book search failed: {}", e)))?;
        let books = parse_volumes(&body)
            .map_err(|e| PortError::Backend(format!("Unexpected book search response: {}", e)))?;
        debug!("Google Books returned {} volumes", books.len());
        Ok(books)
    }
}
