//! Dashboard controller.
//!
//! Owns the poller and every background task the TUI starts (analyses, brief
//! generation, exports) and reports their results back as [`UiEvent`]s.

use super::{check_connections, create_project, generate_brief, spawn_poller, ConnectionReport};
use crate::config::Settings;
use crate::engine::{AnalysisEngine, Facades};
use crate::error::AppError;
use crate::model::{AppEvent, ExecutiveBrief, Page, Project};
use crate::report::{self, ReportData, ReportFormat};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Commands emitted by the TUI.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Submit(String),
    LoadPages(String),
    LoadBrief(String),
    GenerateBrief { project_id: String, regenerate: bool },
    Export { project_id: String, format: ReportFormat },
    Delete(String),
    Refresh,
    CheckConnections,
    Quit,
}

/// Everything the TUI consumes, engine and poller events included.
#[derive(Debug, Clone)]
pub(crate) enum UiEvent {
    App(AppEvent),
    Connections(ConnectionReport),
    ProjectCreated(Project),
    PagesLoaded {
        project_id: String,
        pages: Vec<Page>,
    },
    BriefLoaded {
        project_id: String,
        brief: Option<ExecutiveBrief>,
    },
    BriefGenerated {
        project_id: String,
        result: Result<ExecutiveBrief, String>,
    },
    Exported(Result<PathBuf, String>),
    Deleted(String),
    Notice(String),
}

fn spawn_check(tasks: &mut JoinSet<()>, facades: &Facades, ui_tx: &UnboundedSender<UiEvent>) {
    let facades = facades.clone();
    let ui_tx = ui_tx.clone();
    tasks.spawn(async move {
        let report = check_connections(&facades).await;
        let _ = ui_tx.send(UiEvent::Connections(report));
    });
}

async fn export(facades: &Facades, project_id: &str, format: ReportFormat) -> Result<PathBuf> {
    let data = ReportData::fetch(facades.store.as_ref(), project_id)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let dir = report::default_dir()?;
    report::write_report(&data, format, &dir)
}

/// Serve UI commands until `Quit` or until the UI side hangs up.
///
/// Analyses still running at quit are abandoned; their rows keep the last status
/// written and the next session shows them as they are.
pub(crate) async fn run_controller(
    facades: Facades,
    settings: Settings,
    ui_tx: UnboundedSender<UiEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let (app_tx, mut app_rx) = mpsc::unbounded_channel::<AppEvent>();
    let poller = spawn_poller(
        facades.store.clone(),
        settings.poll_interval,
        app_tx.clone(),
        cancel.child_token(),
    );
    let engine = Arc::new(AnalysisEngine::new(facades.clone(), settings.page_limit));
    let mut tasks: JoinSet<()> = JoinSet::new();

    spawn_check(&mut tasks, &facades, &ui_tx);

    loop {
        tokio::select! {
            biased;
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    UiCommand::Quit => break,
                    UiCommand::Submit(raw) => match create_project(&facades, &raw).await {
                        Ok(project) => {
                            let _ = ui_tx.send(UiEvent::ProjectCreated(project.clone()));
                            poller.refresh_after(settings.refresh_delay);
                            let engine = engine.clone();
                            let app_tx = app_tx.clone();
                            tasks.spawn(async move {
                                engine
                                    .process_project(&project.id, &project.seed_url, &app_tx)
                                    .await;
                            });
                        }
                        Err(e) => {
                            let _ = ui_tx.send(UiEvent::Notice(e.user_message()));
                        }
                    },
                    UiCommand::LoadPages(project_id) => {
                        let store = facades.store.clone();
                        let ui_tx = ui_tx.clone();
                        tasks.spawn(async move {
                            match store.list_pages(&project_id).await {
                                Ok(pages) => {
                                    let _ = ui_tx.send(UiEvent::PagesLoaded { project_id, pages });
                                }
                                Err(e) => {
                                    let _ = ui_tx.send(UiEvent::Notice(e.user_message()));
                                }
                            }
                        });
                    }
                    UiCommand::LoadBrief(project_id) => {
                        let store = facades.store.clone();
                        let ui_tx = ui_tx.clone();
                        tasks.spawn(async move {
                            match store.get_brief(&project_id).await {
                                Ok(brief) => {
                                    let _ = ui_tx.send(UiEvent::BriefLoaded { project_id, brief });
                                }
                                Err(e) => {
                                    let _ = ui_tx.send(UiEvent::Notice(e.user_message()));
                                }
                            }
                        });
                    }
                    UiCommand::GenerateBrief { project_id, regenerate } => {
                        let facades = facades.clone();
                        let ui_tx = ui_tx.clone();
                        let cap = settings.brief_char_cap;
                        tasks.spawn(async move {
                            let result = match facades.store.get_project(&project_id).await {
                                Ok(Some(project)) => {
                                    generate_brief(&facades, &project, cap, regenerate).await
                                }
                                Ok(None) => Err(AppError::NotFound(project_id.clone())),
                                Err(e) => Err(e),
                            };
                            let _ = ui_tx.send(UiEvent::BriefGenerated {
                                project_id,
                                result: result.map_err(|e| e.user_message()),
                            });
                        });
                    }
                    UiCommand::Export { project_id, format } => {
                        let facades = facades.clone();
                        let ui_tx = ui_tx.clone();
                        tasks.spawn(async move {
                            let res = export(&facades, &project_id, format).await;
                            if let Err(e) = &res {
                                warn!(%project_id, error = %e, "export failed");
                            }
                            let _ = ui_tx.send(UiEvent::Exported(res.map_err(|e| format!("{e:#}"))));
                        });
                    }
                    UiCommand::Delete(project_id) => match facades.store.delete_project(&project_id).await {
                        Ok(()) => {
                            info!(%project_id, "project deleted");
                            let _ = ui_tx.send(UiEvent::Deleted(project_id));
                            poller.refresh_now();
                        }
                        Err(e) => {
                            let _ = ui_tx.send(UiEvent::Notice(format!(
                                "Delete failed: {}",
                                e.user_message()
                            )));
                        }
                    },
                    UiCommand::Refresh => poller.refresh_now(),
                    UiCommand::CheckConnections => spawn_check(&mut tasks, &facades, &ui_tx),
                }
            }
            Some(ev) = app_rx.recv() => {
                let _ = ui_tx.send(UiEvent::App(ev));
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "background task failed");
                }
            }
        }
    }

    if !tasks.is_empty() {
        warn!(running = tasks.len(), "abandoning background tasks on quit");
    }
    tasks.shutdown().await;
    poller.shutdown().await;
    cancel.cancel();
    Ok(())
}
