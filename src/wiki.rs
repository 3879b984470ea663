//! Remote MediaWiki access: raw page text, page/redirect listings, image URLs.
//!
//! URL building and response parsing are plain functions so they can be
//! tested without a network. [`WikiClient`] glues them to a blocking HTTP
//! client; the batch runner only sees the [`WikiApi`] trait.

use std::collections::BTreeMap;
use std::collections::HashMap;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::config::WikiConfig;

#[derive(Debug, Error)]
pub enum WikiError {
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("HTTP error {status} while fetching {url}")]
    Status { status: StatusCode, url: String },

    #[error("network error while fetching {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("unexpected API response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("could not build HTTP client: {0}")]
    Client(reqwest::Error),
}

/// What the batch runner needs from a wiki.
pub trait WikiApi {
    /// Raw wikitext of a page.
    fn fetch_page_raw(&self, title: &str) -> Result<String, WikiError>;

    /// Titles of all non-redirect pages. Listing errors end the listing early.
    fn list_pages(&self) -> Vec<String>;

    /// Redirect title -> canonical title. Unresolvable redirects are left out.
    fn list_redirects(&self) -> BTreeMap<String, String>;

    /// Direct download URL of an uploaded file, if the wiki knows it.
    fn image_url(&self, filename: &str) -> Result<Option<String>, WikiError>;

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, WikiError>;
}

fn parse_url(raw: &str) -> Result<Url, WikiError> {
    Url::parse(raw).map_err(|e| WikiError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })
}

/// `index.php?title=<title>&action=raw`
pub fn build_raw_url(index_url: &str, title: &str) -> Result<Url, WikiError> {
    let mut url = parse_url(index_url)?;
    url.query_pairs_mut()
        .append_pair("title", title)
        .append_pair("action", "raw");
    Ok(url)
}

/// `api.php?format=json&<params>`
pub fn build_api_url(api_url: &str, params: &[(&str, &str)]) -> Result<Url, WikiError> {
    let mut url = parse_url(api_url)?;
    {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in params {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("format", "json");
    }
    Ok(url)
}

/* -----------------------------
 * API responses
 * ----------------------------- */

#[derive(Debug, Default, Deserialize)]
struct AllPagesResponse {
    #[serde(default)]
    query: Option<AllPagesQuery>,
    #[serde(default, rename = "continue")]
    cont: Option<AllPagesContinue>,
}

#[derive(Debug, Default, Deserialize)]
struct AllPagesQuery {
    #[serde(default)]
    allpages: Vec<PageEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct PageEntry {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct AllPagesContinue {
    #[serde(default)]
    apcontinue: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RedirectsResponse {
    #[serde(default)]
    query: Option<RedirectsQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct RedirectsQuery {
    #[serde(default)]
    redirects: Vec<RedirectEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct RedirectEntry {
    #[serde(default)]
    to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageInfoResponse {
    #[serde(default)]
    query: Option<ImageInfoQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageInfoQuery {
    #[serde(default)]
    pages: HashMap<String, ImageInfoPage>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageInfoPage {
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageInfo {
    #[serde(default)]
    url: Option<String>,
}

/// One page of a `list=allpages` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllPagesBatch {
    pub titles: Vec<String>,

    /// `apcontinue` token for the next request, if more pages remain.
    pub next: Option<String>,
}

pub fn parse_allpages(body: &str) -> Result<AllPagesBatch, serde_json::Error> {
    let resp: AllPagesResponse = serde_json::from_str(body)?;
    let titles = resp
        .query
        .map(|q| q.allpages)
        .unwrap_or_default()
        .into_iter()
        .map(|p| p.title)
        .filter(|t| !t.is_empty())
        .collect();
    let next = resp.cont.and_then(|c| c.apcontinue);
    Ok(AllPagesBatch { titles, next })
}

pub fn parse_redirect_target(body: &str) -> Result<Option<String>, serde_json::Error> {
    let resp: RedirectsResponse = serde_json::from_str(body)?;
    Ok(resp
        .query
        .and_then(|q| q.redirects.into_iter().next())
        .and_then(|r| r.to))
}

pub fn parse_image_url(body: &str) -> Result<Option<String>, serde_json::Error> {
    let resp: ImageInfoResponse = serde_json::from_str(body)?;
    Ok(resp
        .query
        .into_iter()
        .flat_map(|q| q.pages.into_values())
        .find_map(|p| p.imageinfo.into_iter().next().and_then(|i| i.url)))
}

/* -----------------------------
 * HTTP client
 * ----------------------------- */

/// Blocking client for one wiki.
#[derive(Debug, Clone)]
pub struct WikiClient {
    config: WikiConfig,
    http: reqwest::blocking::Client,
}

impl WikiClient {
    pub fn new(config: WikiConfig) -> Result<Self, WikiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(WikiError::Client)?;
        Ok(Self { config, http })
    }

    fn get_bytes(&self, url: Url) -> Result<Vec<u8>, WikiError> {
        let network = |source| WikiError::Network {
            url: url.to_string(),
            source,
        };
        let resp = self.http.get(url.clone()).send().map_err(network)?;
        if !resp.status().is_success() {
            return Err(WikiError::Status {
                status: resp.status(),
                url: url.to_string(),
            });
        }
        Ok(resp.bytes().map_err(network)?.to_vec())
    }

    fn get_text(&self, url: Url) -> Result<String, WikiError> {
        Ok(crate::decode_lossy(self.get_bytes(url)?))
    }

    fn api<T>(
        &self,
        params: &[(&str, &str)],
        parse: impl Fn(&str) -> Result<T, serde_json::Error>,
    ) -> Result<T, WikiError> {
        let url = build_api_url(&self.config.api_url(), params)?;
        let body = self.get_text(url.clone())?;
        parse(&body).map_err(|source| WikiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Follows `apcontinue` until the listing is exhausted or a request fails.
    fn list_allpages(&self, filter: &str) -> Vec<String> {
        let limit = self.config.page_size.to_string();
        let mut titles: Vec<String> = Vec::new();
        let mut next: Option<String> = None;

        loop {
            let mut params = vec![
                ("action", "query"),
                ("list", "allpages"),
                ("apfilterredir", filter),
                ("aplimit", limit.as_str()),
            ];
            if let Some(token) = next.as_deref() {
                params.push(("apcontinue", token));
            }

            match self.api(&params, parse_allpages) {
                Ok(batch) => {
                    titles.extend(batch.titles);
                    match batch.next {
                        Some(token) => next = Some(token),
                        None => break,
                    }
                }
                Err(e) => {
                    log::error!("Error fetching page list ({filter}) from API: {e}");
                    break;
                }
            }
        }

        titles
    }

    pub fn redirect_target(&self, title: &str) -> Result<Option<String>, WikiError> {
        self.api(
            &[("action", "query"), ("titles", title), ("redirects", "1")],
            parse_redirect_target,
        )
    }
}

impl WikiApi for WikiClient {
    fn fetch_page_raw(&self, title: &str) -> Result<String, WikiError> {
        let url = build_raw_url(&self.config.index_url, title)?;
        self.get_text(url)
    }

    fn list_pages(&self) -> Vec<String> {
        self.list_allpages("nonredirects")
    }

    fn list_redirects(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for title in self.list_allpages("redirects") {
            match self.redirect_target(&title) {
                Ok(Some(target)) => {
                    out.insert(title, target);
                }
                Ok(None) => log::debug!("Redirect {title:?} has no resolvable target"),
                Err(e) => log::warn!("Failed to resolve redirect {title:?}: {e}"),
            }
        }
        out
    }

    fn image_url(&self, filename: &str) -> Result<Option<String>, WikiError> {
        let title = format!("File:{}", filename);
        self.api(
            &[
                ("action", "query"),
                ("titles", title.as_str()),
                ("prop", "imageinfo"),
                ("iiprop", "url"),
            ],
            parse_image_url,
        )
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, WikiError> {
        self.get_bytes(parse_url(url)?)
    }
}
