//! Check-run API: typed shapes and the HTTP client.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use policy_gate_domain::TaskProperties;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;
use uuid::Uuid;

use crate::config::ChecksConfig;
use crate::error::ChecksError;
use crate::Result;

/// Status tag of a remote check run.
///
/// Only `running` matters to the reporter; unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckRunStatus {
    Running,
    Approved,
    Rejected,
    Other(String),
}

impl CheckRunStatus {
    /// Final status for a verdict.
    pub fn for_verdict(succeeded: bool) -> Self {
        if succeeded {
            CheckRunStatus::Approved
        } else {
            CheckRunStatus::Rejected
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CheckRunStatus::Running => "running",
            CheckRunStatus::Approved => "approved",
            CheckRunStatus::Rejected => "rejected",
            CheckRunStatus::Other(s) => s,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, CheckRunStatus::Running)
    }
}

impl From<&str> for CheckRunStatus {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("running") {
            CheckRunStatus::Running
        } else if s.eq_ignore_ascii_case("approved") {
            CheckRunStatus::Approved
        } else if s.eq_ignore_ascii_case("rejected") {
            CheckRunStatus::Rejected
        } else {
            CheckRunStatus::Other(s.to_string())
        }
    }
}

impl fmt::Display for CheckRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CheckRunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CheckRunStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(CheckRunStatus::from(s.as_str()))
    }
}

/// Remote view of one check run. Fields other than these are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRun {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckRunStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_message: Option<String>,
}

impl CheckRun {
    pub fn with_status(status: CheckRunStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether the run is still waiting for a verdict. A missing status is not.
    pub fn is_running(&self) -> bool {
        self.status.as_ref().is_some_and(CheckRunStatus::is_running)
    }
}

/// New state written to a check run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRunUpdate {
    pub status: CheckRunStatus,
    pub result_message: String,
}

impl CheckRunUpdate {
    pub fn verdict(succeeded: bool, message: impl Into<String>) -> Self {
        Self {
            status: CheckRunStatus::for_verdict(succeeded),
            result_message: message.into(),
        }
    }

    /// Request body: the update keyed by the check id.
    pub fn body(&self, check_id: Uuid) -> HashMap<String, &CheckRunUpdate> {
        HashMap::from([(check_id.to_string(), self)])
    }
}

/// Read and write access to check runs of one project.
#[async_trait]
pub trait CheckRunApi: Send + Sync {
    /// Fetch the current state of a check run.
    async fn get_check_run(&self, check_id: Uuid) -> Result<CheckRun>;

    /// Overwrite the status and message of a check run.
    async fn update_check_run(&self, check_id: Uuid, update: &CheckRunUpdate) -> Result<()>;
}

/// Check-run client over the pipelines REST API.
///
/// Each call is a single attempt; retries are the caller's concern.
pub struct HttpCheckRunClient {
    http: reqwest::Client,
    host_url: String,
    project_id: Uuid,
    auth_token: String,
    api_version: String,
}

impl HttpCheckRunClient {
    pub fn new(props: &TaskProperties, config: &ChecksConfig) -> Result<Self> {
        if !props.host_url.starts_with("http://") && !props.host_url.starts_with("https://") {
            return Err(ChecksError::Url(props.host_url.clone()));
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            http,
            host_url: props.host_url.trim_end_matches('/').to_string(),
            project_id: props.project_id,
            auth_token: props.auth_token.clone(),
            api_version: config.api_version.clone(),
        })
    }

    /// Resource URL for one check run.
    pub fn check_run_url(&self, check_id: Uuid) -> String {
        format!(
            "{}/{}/_apis/pipelines/checks/runs/{}",
            self.host_url, self.project_id, check_id
        )
    }
}

#[async_trait]
impl CheckRunApi for HttpCheckRunClient {
    async fn get_check_run(&self, check_id: Uuid) -> Result<CheckRun> {
        let url = self.check_run_url(check_id);
        debug!(%url, "Fetching check run");

        let response = self
            .http
            .get(&url)
            .basic_auth("", Some(&self.auth_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChecksError::Status {
                method: "GET",
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn update_check_run(&self, check_id: Uuid, update: &CheckRunUpdate) -> Result<()> {
        let url = self.check_run_url(check_id);
        let body = serde_json::to_vec(&update.body(check_id))?;
        debug!(%url, status = %update.status, "Posting check run status");

        let response = self
            .http
            .post(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .basic_auth("", Some(&self.auth_token))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChecksError::Status {
                method: "POST",
                url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
