//! REST backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shopfloor_core::{
    Actor, EntityKind, Error, ExecutionRecord, Job, JobFilter, JobId, JobPatch, Reminder,
    ReminderId, ReminderPatch, ReminderStatus, Result, Task, TaskId, TaskPatch,
};

use super::RemoteStore;

/// Body of `POST /tasks/{id}/start`.
#[derive(Serialize)]
struct StartBody<'body> {
    actor: &'body Actor,
    started_at: DateTime<Utc>,
}

/// Body of `POST /tasks/{id}/stop`.
#[derive(Serialize)]
struct StopBody<'body> {
    record: &'body ExecutionRecord,
    total_seconds: u64,
}

/// Body of `PUT /reminders/{id}/status`.
#[derive(Serialize)]
struct StatusBody {
    status: ReminderStatus,
}

/// JSON-over-HTTP remote store.
pub struct HttpRemote {
    /// HTTP client with the configured timeout.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Optional bearer token.
    api_key: Option<String>,
}

impl HttpRemote {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout_seconds: u64, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|err| Error::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Sends a request, mapping 404 to `NotFound` and every other failure to
    /// `RemoteFailure`.
    async fn send(&self, request: RequestBuilder, kind: EntityKind, id: &str) -> Result<Response> {
        let response = self
            .authorize(request)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|err| Error::RemoteFailure(format!("Request failed: {err}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(kind, id));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::RemoteFailure(format!(
                "Backend request failed with status {status}: {error_text}"
            )));
        }
        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|err| Error::RemoteFailure(format!("Failed to parse response: {err}")))
    }
}

/// Query string for a list filter.
fn filter_query(filter: &JobFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(status) = filter.status {
        query.push(("status", status.as_str().to_owned()));
    }
    if filter.include_archived {
        query.push(("archived", "true".to_owned()));
    }
    query
}

#[async_trait]
impl RemoteStore for HttpRemote {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn get_job(&self, job_id: JobId) -> Result<Option<Job>> {
        let id = job_id.to_string();
        let request = self.client.get(self.url(&format!("jobs/{id}")));
        match self.send(request, EntityKind::Job, &id).await {
            Ok(response) => Self::parse(response).await.map(Some),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let request = self
            .client
            .get(self.url("jobs"))
            .query(&filter_query(filter));
        let response = self
            .send(request, EntityKind::Job, &filter.signature())
            .await?;
        Self::parse(response).await
    }

    async fn update_job(&self, job_id: JobId, patch: &JobPatch) -> Result<()> {
        let id = job_id.to_string();
        let request = self.client.patch(self.url(&format!("jobs/{id}"))).json(patch);
        self.send(request, EntityKind::Job, &id).await?;
        Ok(())
    }

    async fn add_task(&self, job_id: JobId, task: &Task) -> Result<Task> {
        let id = job_id.to_string();
        let request = self
            .client
            .post(self.url(&format!("jobs/{id}/tasks")))
            .json(task);
        let response = self.send(request, EntityKind::Job, &id).await?;
        Self::parse(response).await
    }

    async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> Result<()> {
        let id = task_id.to_string();
        let request = self.client.patch(self.url(&format!("tasks/{id}"))).json(patch);
        self.send(request, EntityKind::Task, &id).await?;
        Ok(())
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        let id = task_id.to_string();
        let request = self.client.delete(self.url(&format!("tasks/{id}")));
        self.send(request, EntityKind::Task, &id).await?;
        Ok(())
    }

    async fn start_task_execution(
        &self,
        task_id: TaskId,
        actor: &Actor,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        let id = task_id.to_string();
        let request = self
            .client
            .post(self.url(&format!("tasks/{id}/start")))
            .json(&StartBody { actor, started_at });
        self.send(request, EntityKind::Task, &id).await?;
        Ok(())
    }

    async fn stop_task_execution(&self, record: &ExecutionRecord, total_seconds: u64) -> Result<()> {
        let id = record.task_id.to_string();
        let request = self
            .client
            .post(self.url(&format!("tasks/{id}/stop")))
            .json(&StopBody {
                record,
                total_seconds,
            });
        self.send(request, EntityKind::Task, &id).await?;
        Ok(())
    }

    async fn task_executions(&self, job_id: JobId) -> Result<Vec<ExecutionRecord>> {
        let id = job_id.to_string();
        let request = self.client.get(self.url(&format!("jobs/{id}/executions")));
        let response = self.send(request, EntityKind::Job, &id).await?;
        Self::parse(response).await
    }

    async fn add_reminder(&self, job_id: JobId, reminder: &Reminder) -> Result<Reminder> {
        let id = job_id.to_string();
        let request = self
            .client
            .post(self.url(&format!("jobs/{id}/reminders")))
            .json(reminder);
        let response = self.send(request, EntityKind::Job, &id).await?;
        Self::parse(response).await
    }

    async fn update_reminder(&self, reminder_id: ReminderId, patch: &ReminderPatch) -> Result<()> {
        let id = reminder_id.to_string();
        let request = self
            .client
            .patch(self.url(&format!("reminders/{id}")))
            .json(patch);
        self.send(request, EntityKind::Reminder, &id).await?;
        Ok(())
    }

    async fn set_reminder_status(&self, reminder_id: ReminderId, status: ReminderStatus) -> Result<()> {
        let id = reminder_id.to_string();
        let request = self
            .client
            .put(self.url(&format!("reminders/{id}/status")))
            .json(&StatusBody { status });
        self.send(request, EntityKind::Reminder, &id).await?;
        Ok(())
    }

    async fn delete_reminder(&self, reminder_id: ReminderId) -> Result<()> {
        let id = reminder_id.to_string();
        let request = self.client.delete(self.url(&format!("reminders/{id}")));
        self.send(request, EntityKind::Reminder, &id).await?;
        Ok(())
    }
}
