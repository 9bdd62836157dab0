//! Job-level mutations: field edits, delivery and manual status changes.
//!
//! None of these send the status themselves; the dispatcher persists any
//! status change the transform produced.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopfloor_core::{
    Actor, DeliveryOutcome, Error, Job, JobId, JobPatch, JobStatus, Result, StatusEntry,
};

use super::{Mutation, total_seconds};
use crate::remote::RemoteStore;

/// Edits job fields other than the status.
#[derive(Debug, Clone)]
pub struct UpdateJob {
    /// Job to edit
    pub job_id: JobId,
    /// Fields to change; must not carry a status
    pub patch: JobPatch,
}

#[async_trait]
impl Mutation for UpdateJob {
    type Plan = ();
    type Output = ();

    fn name(&self) -> &'static str {
        "update_job"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        if self.patch.changes_status() {
            return Err(Error::InvalidState(
                "status changes go through deliver or override_status".to_owned(),
            ));
        }
        if self.patch.is_empty() {
            return Ok(None);
        }
        job.apply_patch(&self.patch);
        Ok(Some(()))
    }

    async fn commit(&self, remote: &dyn RemoteStore, _plan: &(), _after: &Job) -> Result<Self::Output> {
        remote.update_job(self.job_id, &self.patch).await
    }
}

/// Hands the job to the customer.
#[derive(Debug, Clone)]
pub struct DeliverJob {
    /// Job to deliver
    pub job_id: JobId,
    /// Who delivers it
    pub actor: Actor,
    /// Delivery instant
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for DeliverJob {
    type Plan = DeliveryOutcome;
    type Output = DeliveryOutcome;

    fn name(&self) -> &'static str {
        "deliver_job"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        let outcome = job.deliver(&self.actor, self.at);
        Ok(outcome.entry.is_some().then_some(outcome))
    }

    async fn commit(&self, remote: &dyn RemoteStore, plan: &Self::Plan, after: &Job) -> Result<Self::Output> {
        if let Some(record) = &plan.stopped {
            remote
                .stop_task_execution(record, total_seconds(after, record.task_id))
                .await?;
        }
        Ok(plan.clone())
    }
}

/// Sets the status by hand, then lets the derivation rule correct it.
#[derive(Debug, Clone)]
pub struct OverrideStatus {
    /// Job to change
    pub job_id: JobId,
    /// Requested status; never `Delivered`
    pub status: JobStatus,
    /// Who overrides it
    pub actor: Actor,
    /// Override instant
    pub at: DateTime<Utc>,
}

#[async_trait]
impl Mutation for OverrideStatus {
    /// History entries appended by the override
    type Plan = Vec<StatusEntry>;
    type Output = Vec<StatusEntry>;

    fn name(&self) -> &'static str {
        "override_status"
    }

    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn apply(&self, job: &mut Job) -> Result<Option<Self::Plan>> {
        if self.status == JobStatus::Delivered {
            return Err(Error::InvalidState(
                "delivery goes through deliver".to_owned(),
            ));
        }
        let entries = job.override_status(self.status, &self.actor, self.at);
        Ok((!entries.is_empty()).then_some(entries))
    }

    async fn commit(&self, _remote: &dyn RemoteStore, plan: &Self::Plan, _after: &Job) -> Result<Self::Output> {
        Ok(plan.clone())
    }
}
