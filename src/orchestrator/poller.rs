//! Background status poller.
//!
//! The store offers no push channel, so the presentation layer keeps its project list
//! fresh by re-fetching while anything is still running. The poller task is owned by
//! a [`PollerHandle`]; dropping the handle cancels it.

use crate::engine::facade::ProjectStore;
use crate::model::{AppEvent, Project, StatusUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Local view of the project list. Statuses never move backwards once terminal.
#[derive(Debug, Default, Clone)]
pub struct ProjectBoard {
    projects: Vec<Project>,
}

impl ProjectBoard {
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub fn has_active(&self) -> bool {
        self.projects.iter().any(|p| !p.status.is_terminal())
    }

    /// Replace the list with a fresh fetch.
    ///
    /// Ordering and membership follow the fetch. A project this board already holds
    /// in a terminal state keeps its status fields if the fetch reports it non-terminal.
    pub fn apply_fetch(&mut self, fetched: Vec<Project>) {
        let merged = fetched
            .into_iter()
            .map(|mut incoming| {
                if let Some(known) = self.get(&incoming.id) {
                    if known.status.is_terminal() && !incoming.status.is_terminal() {
                        debug!(project_id = %incoming.id, "ignoring stale status from fetch");
                        incoming.status = known.status;
                        incoming.progress = known.progress;
                        incoming.progress_message = known.progress_message.clone();
                    }
                }
                incoming
            })
            .collect();
        self.projects = merged;
    }

    /// Apply a status write observed locally, if it is a legal transition.
    pub fn apply_update(&mut self, id: &str, update: &StatusUpdate) {
        let Some(p) = self.projects.iter_mut().find(|p| p.id == id) else {
            return;
        };
        if let Some(next) = update.status {
            if !p.status.can_transition_to(next) {
                return;
            }
            p.status = next;
        }
        if let Some(progress) = update.progress {
            p.progress = Some(progress);
        }
        if let Some(msg) = &update.progress_message {
            p.progress_message = Some(msg.clone());
        }
    }

    /// Show a just-created project before the next fetch picks it up.
    pub fn insert_local(&mut self, project: Project) {
        if self.get(&project.id).is_none() {
            self.projects.insert(0, project);
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.projects.retain(|p| p.id != id);
    }
}

#[derive(Debug)]
enum PollerCommand {
    RefreshNow,
    RefreshAfter(Duration),
}

pub struct PollerHandle {
    cmd_tx: UnboundedSender<PollerCommand>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn refresh_now(&self) {
        let _ = self.cmd_tx.send(PollerCommand::RefreshNow);
    }

    /// One-shot refetch after `delay`, used right after a project is created.
    pub fn refresh_after(&self, delay: Duration) {
        let _ = self.cmd_tx.send(PollerCommand::RefreshAfter(delay));
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the poller: fetch once immediately, then every `interval` while any project is active.
pub fn spawn_poller(
    store: Arc<dyn ProjectStore>,
    interval: Duration,
    events: UnboundedSender<AppEvent>,
    cancel: CancellationToken,
) -> PollerHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let join = tokio::spawn(run(store, interval, events, cancel.clone(), cmd_rx));
    PollerHandle {
        cmd_tx,
        cancel,
        join: Some(join),
    }
}

async fn refresh(
    store: &dyn ProjectStore,
    board: &mut ProjectBoard,
    events: &UnboundedSender<AppEvent>,
) {
    match store.list_projects().await {
        Ok(projects) => {
            board.apply_fetch(projects);
            let _ = events.send(AppEvent::ProjectsRefreshed {
                projects: board.projects().to_vec(),
            });
        }
        Err(e) => {
            warn!(error = %e, "project refresh failed");
            let _ = events.send(AppEvent::RefreshFailed {
                message: e.user_message(),
            });
        }
    }
}

async fn run(
    store: Arc<dyn ProjectStore>,
    interval: Duration,
    events: UnboundedSender<AppEvent>,
    cancel: CancellationToken,
    mut cmd_rx: UnboundedReceiver<PollerCommand>,
) {
    let mut board = ProjectBoard::default();
    refresh(store.as_ref(), &mut board, &events).await;

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut delayed: Option<std::pin::Pin<Box<tokio::time::Sleep>>> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if board.has_active() {
                    refresh(store.as_ref(), &mut board, &events).await;
                }
            }
            cmd = cmd_rx.recv() => match cmd {
                Some(PollerCommand::RefreshNow) => refresh(store.as_ref(), &mut board, &events).await,
                Some(PollerCommand::RefreshAfter(delay)) => {
                    delayed = Some(Box::pin(tokio::time::sleep(delay)));
                }
                None => break,
            },
            _ = async {
                match delayed.as_mut() {
                    Some(sleep) => sleep.await,
                    None => std::future::pending().await,
                }
            } => {
                delayed = None;
                refresh(store.as_ref(), &mut board, &events).await;
            }
        }
    }
    debug!("poller stopped");
}
