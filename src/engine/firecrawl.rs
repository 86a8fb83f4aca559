//! Firecrawl v1 crawl client.
//!
//! A crawl is an asynchronous job: `POST /v1/crawl` returns a job id, then
//! `GET /v1/crawl/{id}` is polled until the job completes. Completed results may be
//! paginated through `next`.

use crate::config::Settings;
use crate::engine::facade::CrawlFacade;
use crate::engine::http;
use crate::error::{AppError, AppResult, Service};
use crate::model::{CrawlOutcome, CrawledPage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const GENERIC_FAILURE: &str = "Failed to crawl website";

pub struct FirecrawlClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CrawlRequest<'a> {
    url: &'a str,
    limit: usize,
    scrape_options: ScrapeOptions,
}

#[derive(Serialize)]
struct ScrapeOptions {
    formats: Vec<&'static str>,
}

#[derive(Deserialize)]
struct StartResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    data: Vec<Document>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "sourceURL")]
    source_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl Document {
    fn into_page(self, seed_url: &str) -> CrawledPage {
        let (title, url) = match self.metadata {
            Some(m) => (m.title, m.source_url.or(m.url)),
            None => (None, None),
        };
        CrawledPage {
            url: url.unwrap_or_else(|| seed_url.to_string()),
            title: title.filter(|t| !t.trim().is_empty()),
            markdown: self.markdown.or(self.content).unwrap_or_default(),
        }
    }
}

impl FirecrawlClient {
    pub fn new(settings: &Settings) -> AppResult<Self> {
        Ok(Self {
            http: http::build_client(settings, Service::Crawl)?,
            base_url: settings.firecrawl_base_url.clone(),
            api_key: settings.firecrawl_api_key.clone(),
            poll_interval: settings.crawl_poll_interval,
            timeout: settings.crawl_timeout,
        })
    }

    fn key(&self) -> AppResult<&str> {
        self.api_key.as_deref().ok_or(AppError::Config {
            service: Service::Crawl,
        })
    }

    async fn start(&self, seed_url: &str, page_cap: usize) -> AppResult<Result<String, String>> {
        let body = CrawlRequest {
            url: seed_url,
            limit: page_cap,
            scrape_options: ScrapeOptions {
                formats: vec!["markdown"],
            },
        };
        let resp = self
            .http
            .post(format!("{}/v1/crawl", self.base_url))
            .bearer_auth(self.key()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(Service::Crawl, e))?;
        let resp = match http::check(Service::Crawl, resp).await? {
            Ok(r) => r,
            Err((status, message)) => {
                warn!(%status, %message, "crawl start rejected");
                return Ok(Err(message));
            }
        };
        let start: StartResponse = resp
            .json()
            .await
            .map_err(|e| AppError::facade(Service::Crawl, format!("unexpected response: {e}")))?;
        match (start.success, start.id) {
            (true, Some(id)) => Ok(Ok(id)),
            _ => Ok(Err(start.error.unwrap_or_else(|| GENERIC_FAILURE.into()))),
        }
    }

    async fn get_status(&self, url: &str) -> AppResult<Result<StatusResponse, String>> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.key()?)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(Service::Crawl, e))?;
        match http::check(Service::Crawl, resp).await? {
            Ok(r) => r
                .json::<StatusResponse>()
                .await
                .map(Ok)
                .map_err(|e| AppError::facade(Service::Crawl, format!("unexpected response: {e}"))),
            Err((_, message)) => Ok(Err(message)),
        }
    }
}

#[async_trait]
impl CrawlFacade for FirecrawlClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn crawl(&self, seed_url: &str, page_cap: usize) -> AppResult<CrawlOutcome> {
        self.key()?;
        let job_id = match self.start(seed_url, page_cap).await? {
            Ok(id) => id,
            Err(message) => return Ok(CrawlOutcome::failed(message)),
        };
        info!(%job_id, seed_url, page_cap, "crawl job started");

        let status_url = format!("{}/v1/crawl/{}", self.base_url, job_id);
        let deadline = Instant::now() + self.timeout;
        let mut status = loop {
            let status = match self.get_status(&status_url).await? {
                Ok(s) => s,
                Err(message) => return Ok(CrawlOutcome::failed(message)),
            };
            match status.status.as_str() {
                "completed" => break status,
                "failed" | "cancelled" => {
                    let message = status
                        .error
                        .unwrap_or_else(|| format!("Crawl job {}", status.status));
                    return Ok(CrawlOutcome::failed(message));
                }
                other => {
                    debug!(
                        status = other,
                        completed = status.completed.unwrap_or(0),
                        total = status.total.unwrap_or(0),
                        "crawl in progress"
                    );
                }
            }
            if Instant::now() >= deadline {
                warn!(%job_id, "crawl wait exceeded");
                return Ok(CrawlOutcome::failed("timeout"));
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        let mut documents = std::mem::take(&mut status.data);
        let mut next = status.next.take();
        let mut seen = HashSet::new();
        while let Some(url) = next.take() {
            if documents.len() >= page_cap {
                break;
            }
            if Instant::now() >= deadline {
                warn!(%job_id, "crawl wait exceeded while paging; keeping partial results");
                break;
            }
            if !seen.insert(url.clone()) {
                warn!(%job_id, %url, "crawl pagination repeated a page");
                break;
            }
            match self.get_status(&url).await? {
                Ok(mut more) => {
                    if more.data.is_empty() {
                        debug!(%job_id, %url, "empty crawl page ends pagination");
                        break;
                    }
                    documents.append(&mut more.data);
                    next = more.next;
                }
                Err(message) => {
                    warn!(%message, "failed to fetch next crawl page; keeping partial results");
                }
            }
        }

        let pages: Vec<CrawledPage> = documents
            .into_iter()
            .take(page_cap)
            .map(|d| d.into_page(seed_url))
            .collect();
        info!(%job_id, pages = pages.len(), "crawl completed");
        Ok(CrawlOutcome::succeeded(pages))
    }
}
