//! Project submission and the connection check.

use crate::engine::Facades;
use crate::error::{AppError, AppResult, Service};
use crate::model::Project;
use reqwest::Url;
use serde::Serialize;
use tracing::{info, warn};

/// Scheme named at the front of `input`, if any.
///
/// `host:port` input such as `example.com:8080` has no scheme.
fn explicit_scheme(input: &str) -> Option<&str> {
    let (scheme, rest) = input.split_once(':')?;
    let mut chars = scheme.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-')) {
        return None;
    }
    if rest.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(scheme)
}

/// Normalize user input into an absolute http(s) URL.
///
/// Input without a scheme gets `https://` prepended before parsing; any scheme
/// other than http(s) is rejected. The returned string is the parsed URL's
/// canonical form, so `example.com` becomes `https://example.com/`.
pub fn normalize_url(input: &str) -> AppResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::EmptyUrl);
    }
    let candidate = match explicit_scheme(trimmed) {
        Some(scheme)
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") =>
        {
            trimmed.to_string()
        }
        Some(scheme) => {
            return Err(AppError::InvalidUrl(format!("unsupported scheme {scheme}")));
        }
        None => format!("https://{trimmed}"),
    };
    let url = Url::parse(&candidate).map_err(|e| AppError::InvalidUrl(e.to_string()))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(AppError::InvalidUrl("missing host".into())),
    }
    Ok(url.to_string())
}

/// Validate the URL, then insert a `queued` project named after its hostname.
///
/// Nothing remote is touched unless the URL is valid and both the store and the
/// crawler are configured.
pub async fn create_project(facades: &Facades, raw_url: &str) -> AppResult<Project> {
    let seed_url = normalize_url(raw_url)?;
    if !facades.store.is_configured() {
        return Err(AppError::Config {
            service: Service::Store,
        });
    }
    if !facades.crawler.is_configured() {
        return Err(AppError::Config {
            service: Service::Crawl,
        });
    }
    let name = Url::parse(&seed_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| seed_url.clone());
    let project = facades.store.insert_project(&seed_url, &name).await?;
    info!(project_id = %project.id, %seed_url, "project created");
    Ok(project)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum StoreHealth {
    Connected,
    Error(String),
    Misconfigured,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub store: StoreHealth,
    pub crawl_configured: bool,
    pub synthesis_configured: bool,
}

impl ConnectionReport {
    pub fn ready(&self) -> bool {
        self.store == StoreHealth::Connected && self.crawl_configured
    }
}

pub async fn check_connections(facades: &Facades) -> ConnectionReport {
    let store = if !facades.store.is_configured() {
        StoreHealth::Misconfigured
    } else {
        match facades.store.ping().await {
            Ok(()) => StoreHealth::Connected,
            Err(e) => {
                warn!(error = %e, "store connection check failed");
                StoreHealth::Error(e.user_message())
            }
        }
    };
    ConnectionReport {
        store,
        crawl_configured: facades.crawler.is_configured(),
        synthesis_configured: facades.synthesizer.is_configured(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::facade::ProjectStore;
    use crate::testing::{FakeCrawler, FakeSynth, MemoryStore};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn facades(store: MemoryStore, crawler: FakeCrawler) -> (Arc<MemoryStore>, Facades) {
        let store = Arc::new(store);
        let f = Facades {
            store: store.clone(),
            crawler: Arc::new(crawler),
            synthesizer: Arc::new(FakeSynth::unconfigured()),
        };
        (store, f)
    }

    #[test]
    fn bare_hostnames_get_https() {
        assert_eq!(normalize_url("example.com").unwrap(), "https://example.com/");
        assert_eq!(
            normalize_url("  http://Example.com/about ").unwrap(),
            "http://example.com/about"
        );
        assert_eq!(
            normalize_url("HTTPS://example.com").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn unusable_input_is_rejected() {
        assert!(matches!(normalize_url("   "), Err(AppError::EmptyUrl)));
        assert!(matches!(normalize_url("exa mple.com"), Err(AppError::InvalidUrl(_))));
        assert!(matches!(normalize_url("https://"), Err(AppError::InvalidUrl(_))));
        assert!(matches!(
            normalize_url("ftp://example.com"),
            Err(AppError::InvalidUrl(_))
        ));
    }

    #[test]
    fn other_schemes_are_not_mistaken_for_hosts() {
        for input in ["mailto:x@example.com", "file:///etc/passwd", "javascript:alert(1)"] {
            let err = normalize_url(input).unwrap_err();
            assert!(
                matches!(&err, AppError::InvalidUrl(msg) if msg.starts_with("unsupported scheme")),
                "{input}: {err:?}"
            );
        }
        assert_eq!(
            normalize_url("example.com:8080/docs").unwrap(),
            "https://example.com:8080/docs"
        );
        assert_eq!(normalize_url("localhost:3000").unwrap(), "https://localhost:3000/");
    }

    #[tokio::test]
    async fn creates_a_queued_project_named_after_the_host() {
        let (store, f) = facades(MemoryStore::default(), FakeCrawler::idle());
        let p = create_project(&f, "www.example.com/pricing").await.unwrap();
        assert_eq!(p.seed_url, "https://www.example.com/pricing");
        assert_eq!(p.name.as_deref(), Some("www.example.com"));
        assert_eq!(store.project(&p.id).status, crate::model::ProjectStatus::Queued);
    }

    #[tokio::test]
    async fn invalid_url_makes_no_remote_call() {
        let (store, f) = facades(MemoryStore::default(), FakeCrawler::idle());
        assert!(create_project(&f, "not a url").await.is_err());
        assert_eq!(store.list_projects().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn missing_crawl_key_refuses_submission() {
        let (store, f) = facades(MemoryStore::default(), FakeCrawler::unconfigured());
        let err = create_project(&f, "example.com").await.unwrap_err();
        assert!(err.is_config());
        assert!(err.user_message().contains("FIRECRAWL_API_KEY"));
        assert!(store.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn connection_report_reflects_presence_flags() {
        let (_, f) = facades(MemoryStore::unconfigured(), FakeCrawler::idle());
        let report = check_connections(&f).await;
        assert_eq!(
            report,
            ConnectionReport {
                store: StoreHealth::Misconfigured,
                crawl_configured: true,
                synthesis_configured: false,
            }
        );
        assert!(!report.ready());
    }
}
