//! In-memory provisioning-step repository.

use crate::job::domain::JobId;
use crate::server::domain::{ProvisioningStep, ServerId, StepId};
use crate::server::ports::{
    ProvisioningStepRepository, StepRepositoryError, StepRepositoryResult,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory step repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStepRepository {
    state: Arc<RwLock<HashMap<StepId, ProvisioningStep>>>,
}

impl InMemoryStepRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned(err: impl std::fmt::Display) -> StepRepositoryError {
    StepRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl ProvisioningStepRepository for InMemoryStepRepository {
    async fn insert_batch(&self, steps: &[ProvisioningStep]) -> StepRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        for step in steps {
            state.insert(step.id(), step.clone());
        }
        Ok(())
    }

    async fn update(&self, step: &ProvisioningStep) -> StepRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_poisoned)?;
        if !state.contains_key(&step.id()) {
            return Err(StepRepositoryError::NotFound(step.id()));
        }
        state.insert(step.id(), step.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: StepId) -> StepRepositoryResult<Option<ProvisioningStep>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state.get(&id).cloned())
    }

    async fn find_by_job(&self, job_id: JobId) -> StepRepositoryResult<Option<ProvisioningStep>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        Ok(state
            .values()
            .find(|step| step.job_id() == Some(job_id))
            .cloned())
    }

    async fn list_for_server(
        &self,
        server_id: ServerId,
    ) -> StepRepositoryResult<Vec<ProvisioningStep>> {
        let state = self.state.read().map_err(lock_poisoned)?;
        let mut steps: Vec<ProvisioningStep> = state
            .values()
            .filter(|step| step.server_id() == server_id)
            .cloned()
            .collect();
        steps.sort_by_key(ProvisioningStep::order);
        Ok(steps)
    }
}
