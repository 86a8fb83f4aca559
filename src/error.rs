//! Error taxonomy shared by the remote clients and the orchestration layer.
//!
//! Every variant renders to a user-facing sentence through [`AppError::user_message`];
//! that string is what ends up in a project's status row or on screen.

use std::fmt;
use thiserror::Error;

/// The three remote collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Store,
    Crawl,
    Synthesis,
}

impl Service {
    pub fn name(self) -> &'static str {
        match self {
            Service::Store => "Supabase",
            Service::Crawl => "Firecrawl",
            Service::Synthesis => "OpenAI",
        }
    }

    /// Environment variables a user should check when this service misbehaves.
    pub fn env_hint(self) -> &'static str {
        match self {
            Service::Store => "your SUPABASE_URL and SUPABASE_ANON_KEY environment variables",
            Service::Crawl => "your FIRECRAWL_API_KEY environment variable",
            Service::Synthesis => "your OPENAI_API_KEY environment variable",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{service} is not configured")]
    Config { service: Service },

    #[error("{service} transport error: {detail}")]
    Transport {
        service: Service,
        detail: String,
        connectivity: bool,
    },

    #[error("{service} error: {message}")]
    Facade { service: Service, message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid store credentials")]
    InvalidCredentials,

    #[error("malformed synthesis output: {0}")]
    MalformedSynthesis(String),

    #[error("no page content available")]
    NoPageContent,

    #[error("empty URL")]
    EmptyUrl,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn facade(service: Service, message: impl Into<String>) -> Self {
        AppError::Facade {
            service,
            message: message.into(),
        }
    }

    /// Map a reqwest failure, separating connectivity problems from everything else.
    pub fn from_reqwest(service: Service, err: reqwest::Error) -> Self {
        let connectivity = err.is_connect() || err.is_timeout();
        AppError::Transport {
            service,
            detail: err.to_string(),
            connectivity,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config { .. })
    }

    /// Human-readable string suitable for a status row or a transient notice.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config { service } => format!(
                "{} is not properly configured. Please check {}.",
                service.name(),
                service.env_hint()
            ),
            AppError::Transport {
                service,
                connectivity: true,
                ..
            } => format!(
                "Unable to connect to {}. Please check {}, or verify your network connection.",
                service.name(),
                service.env_hint()
            ),
            AppError::Transport { detail, .. } => detail.clone(),
            AppError::Facade { message, .. } => message.clone(),
            AppError::Store(message) => format!("Database error: {message}"),
            AppError::InvalidCredentials => {
                "Invalid Supabase API key. Please check your SUPABASE_ANON_KEY environment variable."
                    .to_string()
            }
            AppError::MalformedSynthesis(_) => {
                "The language model returned an unusable brief.".to_string()
            }
            AppError::NoPageContent => {
                "No page content available yet. Wait for the crawl to finish, then try again."
                    .to_string()
            }
            AppError::EmptyUrl => "Please enter a URL".to_string(),
            AppError::InvalidUrl(_) => "Please enter a valid URL".to_string(),
            AppError::NotFound(id) => format!("No project with id {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_name_the_env_vars() {
        let msg = AppError::Config {
            service: Service::Crawl,
        }
        .user_message();
        assert!(msg.contains("Firecrawl"));
        assert!(msg.contains("FIRECRAWL_API_KEY"));
    }

    #[test]
    fn connectivity_is_distinct_from_generic_transport() {
        let conn = AppError::Transport {
            service: Service::Store,
            detail: "tcp reset".into(),
            connectivity: true,
        };
        let other = AppError::Transport {
            service: Service::Store,
            detail: "tcp reset".into(),
            connectivity: false,
        };
        assert!(conn.user_message().starts_with("Unable to connect to Supabase"));
        assert_eq!(other.user_message(), "tcp reset");
    }

    #[test]
    fn facade_errors_pass_the_message_through() {
        assert_eq!(
            AppError::facade(Service::Crawl, "timeout").user_message(),
            "timeout"
        );
    }
}
