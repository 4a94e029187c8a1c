//! Hosting shim: drives the coordinator through its lifecycle and keeps
//! detached background work alive.
//!
//! The coordinator itself holds no event-loop bindings. The host owns the
//! worker state machine, refuses to serve before activation completes, and
//! spawns revalidation tasks into a `JoinSet` so they outlive the request
//! that produced them.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::request::Request;
use crate::cache::response::Response;
use crate::coordinator::lifecycle::{ProvisionReport, ReconcileReport};
use crate::coordinator::strategy::RevalidationOutcome;
use crate::coordinator::SharedCoordinator;
use crate::error::LifecycleError;

/// Lifecycle state of the hosted worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// A lifecycle transition failed; this instance will never serve.
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Owns one coordinator instance and its background tasks.
pub struct WorkerHost {
    coordinator: SharedCoordinator,
    state: RwLock<WorkerState>,
    tasks: Mutex<JoinSet<RevalidationOutcome>>,
}

impl WorkerHost {
    pub fn new(coordinator: SharedCoordinator) -> Self {
        Self {
            coordinator,
            state: RwLock::new(WorkerState::Parsed),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    pub fn coordinator(&self) -> &SharedCoordinator {
        &self.coordinator
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), LifecycleError> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(LifecycleError::InvalidTransition { from: *state, to });
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.write().await = to;
    }

    /// Fire the install trigger and wait for provisioning to finish.
    pub async fn install(&self) -> Result<ProvisionReport, LifecycleError> {
        self.transition(WorkerState::Parsed, WorkerState::Installing).await?;

        match self.coordinator.on_install().await {
            Ok(report) => {
                self.set_state(WorkerState::Installed).await;
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Install failed");
                self.set_state(WorkerState::Redundant).await;
                Err(e)
            }
        }
    }

    /// Fire the activate trigger and wait for reconciliation to finish.
    pub async fn activate(&self) -> Result<ReconcileReport, LifecycleError> {
        self.transition(WorkerState::Installed, WorkerState::Activating).await?;

        match self.coordinator.on_activate().await {
            Ok(report) => {
                self.set_state(WorkerState::Activated).await;
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Activation failed");
                self.set_state(WorkerState::Redundant).await;
                Err(e)
            }
        }
    }

    /// Install, then activate straight away when the install asks to skip waiting.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let report = self.install().await?;
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "Installed with missing shell entries");
        }
        if report.skip_waiting {
            self.activate().await?;
        } else {
            info!("Installed, waiting for activation");
        }
        Ok(())
    }

    /// Offer a request to the coordinator.
    ///
    /// Returns `None` when the request is not intercepted, including every
    /// request that arrives before activation has completed.
    pub async fn handle(&self, request: Request) -> Option<Response> {
        if self.state().await != WorkerState::Activated {
            debug!(url = %request.url, "Not activated, passing request through");
            return None;
        }

        let interception = self.coordinator.on_request(request).await?;
        if let Some(revalidation) = interception.revalidation {
            let mut tasks = self.tasks.lock().await;
            while tasks.try_join_next().is_some() {}
            tasks.spawn(revalidation.into_future());
        }
        Some(interception.response)
    }

    /// Number of background tasks not yet reaped.
    pub async fn pending_tasks(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Wait up to `grace` for outstanding background tasks, then abort the rest.
    /// Returns how many settled on their own.
    pub async fn drain(&self, grace: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().await);
        let deadline = Instant::now() + grace;
        let mut settled = 0;

        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(result)) => {
                    if let Err(e) = result {
                        warn!(error = %e, "Background task aborted");
                    }
                    settled += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(remaining = tasks.len(), "Shutdown grace elapsed, aborting background tasks");
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    break;
                }
            }
        }
        settled
    }
}

/// Thread-safe handle to the host.
pub type SharedHost = Arc<WorkerHost>;
