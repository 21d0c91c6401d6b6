pub mod error;
pub mod indexer;
pub mod model;
pub mod query;
pub mod reader;
pub mod server;

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::model::DayModel;

/// Where the one-shot ingestion pass currently stands. `Ready` is entered
/// only after the indexer returns cleanly; `Failed` is terminal until the
/// process is restarted.
#[derive(Debug, Clone)]
pub enum IngestState {
    Loading,
    Ready(Arc<DayModel>),
    Failed(String),
}

/// Shared handle constructed once at startup and passed by reference to the
/// ingestion task and every transport handler. The model behind `Ready` is
/// immutable, so readers never contend once the state flips.
pub struct ServiceContext {
    state: RwLock<IngestState>,
}

impl ServiceContext {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IngestState::Loading),
        }
    }

    pub fn mark_ready(&self, model: DayModel) {
        if let Ok(mut state) = self.state.write() {
            *state = IngestState::Ready(Arc::new(model));
        }
    }

    pub fn mark_failed(&self, reason: String) {
        if let Ok(mut state) = self.state.write() {
            *state = IngestState::Failed(reason);
        }
    }

    pub fn snapshot(&self) -> IngestState {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(_) => IngestState::Failed("state lock poisoned".to_string()),
        }
    }
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.snapshot() {
            IngestState::Loading => "loading",
            IngestState::Ready(_) => "ready",
            IngestState::Failed(_) => "failed",
        };
        f.debug_struct("ServiceContext").field("state", &state).finish()
    }
}
