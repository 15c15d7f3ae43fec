use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::query::RequestDescriptor;
use crate::specimen::{CategoryIndex, Specimen};

const ERROR_BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("HTTP request failed for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} for {url}: {detail}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        detail: String,
    },
    #[error("Unexpected response shape from {url}: {detail}")]
    Decode { url: String, detail: String },
    #[error("Response from {url} broke the pagination contract: {detail}")]
    Contract { url: String, detail: String },
    #[error("Invalid catalog URL {0:?}")]
    InvalidUrl(String),
}

impl CatalogError {
    /// Transport failures and non-success statuses.
    pub fn is_network(&self) -> bool {
        matches!(self, CatalogError::Network { .. } | CatalogError::Status { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecimenPage {
    pub items: Vec<Specimen>,
    pub total: u64,
    pub total_pages: u32,
}

pub trait CatalogSource: Send + Sync {
    fn fetch_categories(&self) -> Result<CategoryIndex, CatalogError>;
    fn fetch_specimens(&self, descriptor: &RequestDescriptor)
        -> Result<SpecimenPage, CatalogError>;
}

#[derive(Deserialize)]
struct CategoriesEnvelope {
    data: CategoryIndex,
}

#[derive(Deserialize)]
struct SpecimensEnvelope {
    data: Vec<Specimen>,
    pagination: PaginationEnvelope,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaginationEnvelope {
    total: u64,
    total_pages: u32,
}

pub struct CatalogClient {
    client: Client,
    base: String,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> Result<Self, CatalogError> {
        let base = normalize_base_url(base_url);
        if Url::parse(&base).is_err() {
            return Err(CatalogError::InvalidUrl(base_url.to_string()));
        }
        let client = build_http_client().map_err(|source| CatalogError::Network {
            url: base.clone(),
            source,
        })?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let body = http_get_bytes(&self.client, url)?;
        decode_json(url, &body)
    }
}

impl CatalogSource for CatalogClient {
    fn fetch_categories(&self) -> Result<CategoryIndex, CatalogError> {
        let url = categories_url(&self.base);
        let envelope = self.get_json::<CategoriesEnvelope>(&url)?;
        Ok(envelope.data)
    }

    fn fetch_specimens(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<SpecimenPage, CatalogError> {
        let url = specimens_url(&self.base, descriptor)?;
        let body = http_get_bytes(&self.client, &url)?;
        parse_specimen_page(&url, &body, descriptor.limit)
    }
}

fn build_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(None::<Duration>)
        .build()
}

pub fn normalize_base_url(base_url: &str) -> String {
    strip_query_and_fragment(base_url.trim())
        .trim()
        .trim_end_matches('/')
        .to_string()
}

fn strip_query_and_fragment(value: &str) -> &str {
    let query_index = value.find('?').unwrap_or(value.len());
    let fragment_index = value.find('#').unwrap_or(value.len());
    &value[..query_index.min(fragment_index)]
}

fn categories_url(base: &str) -> String {
    format!("{base}/categories")
}

fn specimens_url(base: &str, descriptor: &RequestDescriptor) -> Result<String, CatalogError> {
    let raw = format!("{base}/specimens");
    let mut url = Url::parse(&raw).map_err(|_| CatalogError::InvalidUrl(raw.clone()))?;
    url.query_pairs_mut()
        .extend_pairs(descriptor.query_pairs());
    Ok(url.into())
}

fn parse_specimen_page(url: &str, body: &[u8], limit: u32) -> Result<SpecimenPage, CatalogError> {
    let envelope = decode_json::<SpecimensEnvelope>(url, body)?;
    let page = SpecimenPage {
        items: envelope.data,
        total: envelope.pagination.total,
        total_pages: envelope.pagination.total_pages,
    };
    check_page_contract(url, &page, limit)?;
    Ok(page)
}

fn check_page_contract(url: &str, page: &SpecimenPage, limit: u32) -> Result<(), CatalogError> {
    let count = page.items.len();
    if count > limit as usize {
        return Err(CatalogError::Contract {
            url: url.to_string(),
            detail: format!("{count} items returned for a page limit of {limit}"),
        });
    }
    if page.total < count as u64 {
        return Err(CatalogError::Contract {
            url: url.to_string(),
            detail: format!("total {} is smaller than the {count} items returned", page.total),
        });
    }
    Ok(())
}

fn decode_json<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T, CatalogError> {
    serde_json::from_slice(body).map_err(|err| CatalogError::Decode {
        url: url.to_string(),
        detail: err.to_string(),
    })
}

fn http_get_bytes(client: &Client, url: &str) -> Result<Vec<u8>, CatalogError> {
    let response = client
        .get(url)
        .header(ACCEPT, "application/json")
        .send()
        .map_err(|source| CatalogError::Network {
            url: url.to_string(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        let detail = response
            .text()
            .map(|text| text.chars().take(ERROR_BODY_EXCERPT_CHARS).collect())
            .unwrap_or_else(|_| String::from("unable to read error body"));
        return Err(CatalogError::Status {
            url: url.to_string(),
            status,
            detail,
        });
    }

    response
        .bytes()
        .map(|body| body.to_vec())
        .map_err(|source| CatalogError::Network {
            url: url.to_string(),
            source,
        })
}
