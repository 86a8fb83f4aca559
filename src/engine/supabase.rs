//! Supabase (PostgREST) client for the `projects`, `pages` and `executive_briefs` tables.

use crate::config::Settings;
use crate::engine::facade::ProjectStore;
use crate::engine::http;
use crate::error::{AppError, AppResult, Service};
use crate::model::{
    BriefSections, ExecutiveBrief, NewPage, NewProject, Page, Project, ProjectStatus,
    StatusUpdate,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Every table the app reads or writes.
const TABLES: [&str; 3] = ["projects", "pages", "executive_briefs"];

pub struct SupabaseStore {
    http: Client,
    rest_url: String,
    anon_key: Option<String>,
}

#[derive(Serialize)]
struct BriefRow<'a> {
    project_id: &'a str,
    #[serde(flatten)]
    sections: &'a BriefSections,
    #[serde(with = "time::serde::rfc3339")]
    generated_at: OffsetDateTime,
}

impl SupabaseStore {
    pub fn new(settings: &Settings) -> AppResult<Self> {
        let anon_key = if settings.store_configured() {
            settings.supabase_anon_key.clone()
        } else {
            None
        };
        Ok(Self {
            http: http::build_client(settings, Service::Store)?,
            rest_url: format!("{}/rest/v1", settings.supabase_url),
            anon_key,
        })
    }

    fn key(&self) -> AppResult<&str> {
        self.anon_key.as_deref().ok_or(AppError::Config {
            service: Service::Store,
        })
    }

    fn request(&self, method: reqwest::Method, table: &str) -> AppResult<RequestBuilder> {
        let key = self.key()?;
        Ok(self
            .http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", key)
            .bearer_auth(key))
    }

    async fn send(&self, req: RequestBuilder) -> AppResult<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(Service::Store, e))?;
        match http::check(Service::Store, resp).await? {
            Ok(resp) => Ok(resp),
            Err((status, message)) => Err(store_error(status, message)),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> AppResult<Vec<T>> {
        let resp = self.send(req).await?;
        resp.json::<Vec<T>>()
            .await
            .map_err(|e| AppError::Store(format!("unexpected response: {e}")))
    }
}

fn store_error(status: StatusCode, message: String) -> AppError {
    if status == StatusCode::UNAUTHORIZED || message.contains("Invalid API key") {
        warn!(%status, "store rejected credentials");
        return AppError::InvalidCredentials;
    }
    warn!(%status, %message, "store request failed");
    AppError::Store(message)
}

fn eq(v: &str) -> String {
    format!("eq.{v}")
}

#[async_trait]
impl ProjectStore for SupabaseStore {
    fn is_configured(&self) -> bool {
        self.anon_key.is_some()
    }

    async fn ping(&self) -> AppResult<()> {
        for table in TABLES {
            let req = self
                .request(reqwest::Method::GET, table)?
                .query(&[("select", "id"), ("limit", "1")]);
            self.send(req).await.map_err(|e| match e {
                AppError::Store(message) => AppError::Store(format!("{table}: {message}")),
                other => other,
            })?;
        }
        Ok(())
    }

    async fn list_projects(&self) -> AppResult<Vec<Project>> {
        let req = self
            .request(reqwest::Method::GET, "projects")?
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let projects: Vec<Project> = self.fetch(req).await?;
        debug!(count = projects.len(), "fetched projects");
        Ok(projects)
    }

    async fn get_project(&self, id: &str) -> AppResult<Option<Project>> {
        let filter = eq(id);
        let req = self.request(reqwest::Method::GET, "projects")?.query(&[
            ("select", "*"),
            ("id", filter.as_str()),
            ("limit", "1"),
        ]);
        let mut rows: Vec<Project> = self.fetch(req).await?;
        Ok(rows.pop())
    }

    async fn insert_project(&self, seed_url: &str, name: &str) -> AppResult<Project> {
        let row = NewProject {
            seed_url: seed_url.to_string(),
            name: name.to_string(),
            status: ProjectStatus::Queued,
        };
        let req = self
            .request(reqwest::Method::POST, "projects")?
            .header("Prefer", "return=representation")
            .json(&[row]);
        let mut rows: Vec<Project> = self.fetch(req).await?;
        rows.pop()
            .ok_or_else(|| AppError::Store("insert returned no row".into()))
    }

    async fn update_project_status(&self, id: &str, update: &StatusUpdate) -> AppResult<()> {
        let req = self
            .request(reqwest::Method::PATCH, "projects")?
            .query(&[("id", eq(id))])
            .header("Prefer", "return=minimal")
            .json(update);
        self.send(req).await.map(|_| ())
    }

    async fn insert_pages(&self, rows: &[NewPage]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let req = self
            .request(reqwest::Method::POST, "pages")?
            .header("Prefer", "return=minimal")
            .json(rows);
        self.send(req).await.map(|_| ())
    }

    async fn list_pages(&self, project_id: &str) -> AppResult<Vec<Page>> {
        let filter = eq(project_id);
        let req = self.request(reqwest::Method::GET, "pages")?.query(&[
            ("select", "*"),
            ("project_id", filter.as_str()),
            ("order", "created_at.desc"),
        ]);
        self.fetch(req).await
    }

    async fn upsert_brief(
        &self,
        project_id: &str,
        sections: &BriefSections,
        generated_at: OffsetDateTime,
    ) -> AppResult<ExecutiveBrief> {
        let row = BriefRow {
            project_id,
            sections,
            generated_at,
        };
        let req = self
            .request(reqwest::Method::POST, "executive_briefs")?
            .query(&[("on_conflict", "project_id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[row]);
        let mut rows: Vec<ExecutiveBrief> = self.fetch(req).await?;
        rows.pop()
            .ok_or_else(|| AppError::Store("upsert returned no row".into()))
    }

    async fn get_brief(&self, project_id: &str) -> AppResult<Option<ExecutiveBrief>> {
        let filter = eq(project_id);
        let req = self.request(reqwest::Method::GET, "executive_briefs")?.query(&[
            ("select", "*"),
            ("project_id", filter.as_str()),
            ("limit", "1"),
        ]);
        let mut rows: Vec<ExecutiveBrief> = self.fetch(req).await?;
        Ok(rows.pop())
    }

    async fn delete_project(&self, id: &str) -> AppResult<()> {
        let req = self
            .request(reqwest::Method::DELETE, "projects")?
            .query(&[("id", eq(id))]);
        self.send(req).await.map(|_| ())
    }
}
