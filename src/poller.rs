use crate::client::BeadsClient;
use crate::errors::AppResult;
use crate::models::PollData;
use crate::runtime::RuntimeKind;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeState {
    Unchecked,
    Unchanged,
    Changed,
}

/// Decides when a full fetch is worth making for the active project.
#[derive(Clone)]
pub struct PollCoordinator {
    client: BeadsClient,
    project: Arc<RwLock<Option<String>>>,
    last_state: Arc<RwLock<ChangeState>>,
}

impl PollCoordinator {
    pub fn new(client: BeadsClient, project: Option<String>) -> Self {
        Self {
            client,
            project: Arc::new(RwLock::new(project)),
            last_state: Arc::new(RwLock::new(ChangeState::Unchecked)),
        }
    }

    pub fn project(&self) -> Option<String> {
        self.project.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn state(&self) -> ChangeState {
        *self.last_state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, state: ChangeState) -> ChangeState {
        *self.last_state.write().unwrap_or_else(PoisonError::into_inner) = state;
        state
    }

    /// The web tier has no cheap probe, so it always reports a change.
    pub async fn check(&self) -> AppResult<ChangeState> {
        if self.client.runtime() == RuntimeKind::Web {
            return Ok(self.record(ChangeState::Changed));
        }
        let project = self.project();
        let changed = self.client.check_changed(project.as_deref()).await?;
        Ok(self.record(if changed {
            ChangeState::Changed
        } else {
            ChangeState::Unchanged
        }))
    }

    /// `None` when nothing changed since the last check.
    pub async fn poll(&self) -> AppResult<Option<PollData>> {
        if self.check().await? == ChangeState::Unchanged {
            return Ok(None);
        }
        let project = self.project();
        let data = self.client.poll_data(project.as_deref()).await?;
        tracing::debug!(
            project = project.as_deref().unwrap_or_default(),
            open = data.open.len(),
            closed = data.closed.len(),
            ready = data.ready.len(),
            "poll fetched issues"
        );
        Ok(Some(data))
    }

    /// Makes `dir` active and forgets its baseline so the next check reports
    /// a change.
    pub async fn switch_project(&self, dir: Option<String>) -> AppResult<()> {
        *self.project.write().unwrap_or_else(PoisonError::into_inner) = dir.clone();
        self.record(ChangeState::Unchecked);
        self.client.reset_mtime(dir.as_deref()).await?;
        tracing::info!(project = dir.as_deref().unwrap_or_default(), "switched active project");
        Ok(())
    }

    pub fn spawn<F>(&self, interval: Duration, mut on_data: F) -> JoinHandle<()>
    where
        F: FnMut(PollData) + Send + 'static,
    {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match coordinator.poll().await {
                    Ok(Some(data)) => on_data(data),
                    Ok(None) => {}
                    Err(error) => tracing::warn!(error = %error, "poll failed"),
                }
            }
        })
    }
}
