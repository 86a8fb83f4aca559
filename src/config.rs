//! Runtime configuration.
//!
//! Every setting is a CLI flag with an environment-variable fallback. The resolved
//! [`Settings`] carry the three presence flags that gate remote operations.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_FIRECRAWL_BASE_URL: &str = "https://api.firecrawl.dev";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const MAX_PAGE_LIMIT: usize = 50;

#[derive(Debug, Args, Clone)]
pub struct ServiceArgs {
    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL", global = true)]
    pub supabase_url: Option<String>,

    /// Supabase anon key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true, global = true)]
    pub supabase_anon_key: Option<String>,

    /// Firecrawl API key
    #[arg(long, env = "FIRECRAWL_API_KEY", hide_env_values = true, global = true)]
    pub firecrawl_api_key: Option<String>,

    /// Firecrawl API base URL
    #[arg(long, env = "FIRECRAWL_BASE_URL", default_value = DEFAULT_FIRECRAWL_BASE_URL, global = true)]
    pub firecrawl_base_url: String,

    /// OpenAI API key (enables executive briefs)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL, global = true)]
    pub openai_base_url: String,

    /// Model used for executive briefs
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL, global = true)]
    pub openai_model: String,

    /// Maximum number of pages to crawl per project (1-50)
    #[arg(long, default_value_t = 10, global = true)]
    pub page_limit: usize,

    /// Dashboard polling interval while projects are running
    #[arg(long, default_value = "3s", global = true)]
    pub poll_interval: humantime::Duration,

    /// Delay of the one-shot refresh after a project is created
    #[arg(long, default_value = "1s", global = true)]
    pub refresh_delay: humantime::Duration,

    /// Interval between crawl-job status checks
    #[arg(long, default_value = "2s", global = true)]
    pub crawl_poll_interval: humantime::Duration,

    /// Give up waiting for a crawl job after this long
    #[arg(long, default_value = "10m", global = true)]
    pub crawl_timeout: humantime::Duration,

    /// Character cap on page content sent for an on-demand brief
    #[arg(long, default_value_t = 40_000, global = true)]
    pub brief_char_cap: usize,

    /// Character cap applied by the synthesis client to every request
    #[arg(long, default_value_t = 8_000, global = true)]
    pub synthesis_char_cap: usize,

    /// Per-request HTTP timeout
    #[arg(long, default_value = "60s", global = true)]
    pub request_timeout: humantime::Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub supabase_url: String,
    #[serde(skip_serializing)]
    pub supabase_anon_key: Option<String>,
    #[serde(skip_serializing)]
    pub firecrawl_api_key: Option<String>,
    pub firecrawl_base_url: String,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub page_limit: usize,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub refresh_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub crawl_poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub crawl_timeout: Duration,
    pub brief_char_cap: usize,
    pub synthesis_char_cap: usize,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Settings {
    pub fn from_args(args: &ServiceArgs) -> Self {
        Self {
            supabase_url: non_blank(&args.supabase_url)
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            supabase_anon_key: non_blank(&args.supabase_anon_key),
            firecrawl_api_key: non_blank(&args.firecrawl_api_key),
            firecrawl_base_url: args.firecrawl_base_url.trim_end_matches('/').to_string(),
            openai_api_key: non_blank(&args.openai_api_key),
            openai_base_url: args.openai_base_url.trim_end_matches('/').to_string(),
            openai_model: args.openai_model.clone(),
            page_limit: args.page_limit.clamp(1, MAX_PAGE_LIMIT),
            poll_interval: Duration::from(args.poll_interval),
            refresh_delay: Duration::from(args.refresh_delay),
            crawl_poll_interval: Duration::from(args.crawl_poll_interval),
            crawl_timeout: Duration::from(args.crawl_timeout),
            brief_char_cap: args.brief_char_cap,
            synthesis_char_cap: args.synthesis_char_cap,
            request_timeout: Duration::from(args.request_timeout),
            user_agent: format!("scrapemate/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn store_configured(&self) -> bool {
        !self.supabase_url.is_empty() && self.supabase_anon_key.is_some()
    }

    pub fn crawl_configured(&self) -> bool {
        self.firecrawl_api_key.is_some()
    }

    pub fn synthesis_configured(&self) -> bool {
        self.openai_api_key.is_some()
    }

    /// JSON view for the `config` subcommand. Keys are reported only as present/absent.
    pub fn redacted_json(&self) -> serde_json::Value {
        let mut v = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(obj) = v.as_object_mut() {
            obj.insert(
                "supabase_anon_key".into(),
                serde_json::Value::Bool(self.supabase_anon_key.is_some()),
            );
            obj.insert(
                "firecrawl_api_key".into(),
                serde_json::Value::Bool(self.firecrawl_api_key.is_some()),
            );
            obj.insert(
                "openai_api_key".into(),
                serde_json::Value::Bool(self.openai_api_key.is_some()),
            );
        }
        v
    }
}

#[cfg(test)]
impl Settings {
    /// Fully configured settings pointing every service at `base`.
    pub fn for_tests(base: &str) -> Self {
        Self {
            supabase_url: base.to_string(),
            supabase_anon_key: Some("anon".into()),
            firecrawl_api_key: Some("fc-key".into()),
            firecrawl_base_url: base.to_string(),
            openai_api_key: Some("sk-key".into()),
            openai_base_url: base.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.into(),
            page_limit: 10,
            poll_interval: Duration::from_secs(3),
            refresh_delay: Duration::from_secs(1),
            crawl_poll_interval: Duration::from_millis(10),
            crawl_timeout: Duration::from_secs(5),
            brief_char_cap: 40_000,
            synthesis_char_cap: 8_000,
            request_timeout: Duration::from_secs(5),
            user_agent: "scrapemate/test".into(),
        }
    }
}
