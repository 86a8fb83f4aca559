//! Application-level orchestration.
//!
//! Project submission, the status poller and on-demand brief generation. UI and CLI
//! layers call into this module so both present the same behaviour.

mod brief;
#[cfg(feature = "tui")]
mod controller;
mod poller;
mod submit;

pub(crate) use brief::generate_brief;
#[cfg(feature = "tui")]
pub(crate) use controller::{run_controller, UiCommand, UiEvent};
pub(crate) use poller::{spawn_poller, PollerHandle, ProjectBoard};
pub(crate) use submit::{check_connections, create_project, ConnectionReport, StoreHealth};
