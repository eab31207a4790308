//! Evaluation requests and the orchestration identifiers that make them asynchronous.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RequestError, Result};

/// Variable that turns on verbose explain output and verbose log propagation.
pub const DEBUG_VARIABLE: &str = "system.debug";

/// Caller-supplied pipeline variables.
///
/// Keys are folded to lowercase on the way in, so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, String>", into = "HashMap<String, String>")]
pub struct Variables(HashMap<String, String>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a variable, replacing any existing entry whose key differs only in case.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into().to_lowercase(), value.into());
    }

    /// Case-insensitive lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Whether `system.debug` is present and parses as `true`.
    ///
    /// Absent, empty and unparsable values all count as `false`.
    pub fn is_debug_enabled(&self) -> bool {
        self.get(DEBUG_VARIABLE)
            .and_then(parse_bool)
            .unwrap_or(false)
    }
}

impl From<HashMap<String, String>> for Variables {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Variables> for HashMap<String, String> {
    fn from(vars: Variables) -> Self {
        vars.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        for (k, v) in iter {
            vars.insert(k, v);
        }
        vars
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// An inbound evaluation request.
///
/// Requests carrying an auth token are handled asynchronously against the
/// remote check suite; all others are evaluated inline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    /// Evidence document (image provenance), an array of opaque JSON values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_provenance: Option<Vec<serde_json::Value>>,

    /// Rego policy source text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Variables>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_suite_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_id: Option<Uuid>,
}

impl EvaluationRequest {
    /// Create a synchronous request from evidence and policy text.
    pub fn new(evidence: Vec<serde_json::Value>, policy: impl Into<String>) -> Self {
        Self {
            image_provenance: Some(evidence),
            policy_data: Some(policy.into()),
            ..Self::default()
        }
    }

    /// Parse a request body.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Attach caller variables.
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Reject requests with missing evidence or a blank policy.
    pub fn validate(&self) -> Result<()> {
        match &self.image_provenance {
            Some(evidence) if !evidence.is_empty() => {}
            _ => return Err(RequestError::EmptyEvidence),
        }
        match &self.policy_data {
            Some(policy) if !policy.trim().is_empty() => Ok(()),
            _ => Err(RequestError::EmptyPolicy),
        }
    }

    /// Evidence serialized as the JSON text handed to the evaluator.
    pub fn evidence_json(&self) -> Result<String> {
        match &self.image_provenance {
            Some(evidence) if !evidence.is_empty() => Ok(serde_json::to_string(evidence)?),
            _ => Err(RequestError::EmptyEvidence),
        }
    }

    /// Policy text, or an empty string when absent.
    pub fn policy(&self) -> &str {
        self.policy_data.as_deref().unwrap_or_default()
    }

    /// Caller variables, or an empty set when absent.
    pub fn variables(&self) -> Variables {
        self.variables.clone().unwrap_or_default()
    }

    /// Whether this request should be acknowledged immediately and reported remotely.
    pub fn is_asynchronous(&self) -> bool {
        self.auth_token
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }

    /// Validate the orchestration identifiers required for asynchronous handling.
    pub fn task_properties(&self) -> Result<TaskProperties> {
        let mut missing = Vec::new();
        let host_url = self
            .host_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let auth_token = self
            .auth_token
            .as_deref()
            .filter(|s| !s.trim().is_empty());

        if self.project_id.is_none() {
            missing.push("ProjectId");
        }
        if self.plan_id.is_none() {
            missing.push("PlanId");
        }
        if host_url.is_none() {
            missing.push("PlanUrl");
        }
        if self.job_id.is_none() {
            missing.push("JobId");
        }
        if self.timeline_id.is_none() {
            missing.push("TimelineId");
        }
        if auth_token.is_none() {
            missing.push("AuthToken");
        }
        if self.check_suite_id.is_none() {
            missing.push("CheckSuiteId");
        }

        match (
            host_url,
            auth_token,
            self.project_id,
            self.plan_id,
            self.job_id,
            self.timeline_id,
            self.check_suite_id,
        ) {
            (
                Some(host_url),
                Some(auth_token),
                Some(project_id),
                Some(plan_id),
                Some(job_id),
                Some(timeline_id),
                Some(check_suite_id),
            ) => {
                let hub_name = match self.hub_name.as_deref() {
                    Some(name) if !name.trim().is_empty() => name.parse()?,
                    _ => HubName::default(),
                };
                Ok(TaskProperties {
                    host_url: host_url.trim_end_matches('/').to_string(),
                    project_id,
                    hub_name,
                    plan_id,
                    job_id,
                    timeline_id,
                    check_suite_id,
                    auth_token: auth_token.to_string(),
                })
            }
            _ => Err(RequestError::MissingProperties(missing)),
        }
    }
}

/// Orchestration hub that owns the pipeline plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HubName {
    #[default]
    Build,
    Gates,
}

impl HubName {
    pub fn as_str(&self) -> &'static str {
        match self {
            HubName::Build => "Build",
            HubName::Gates => "Gates",
        }
    }
}

impl fmt::Display for HubName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HubName {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("build") {
            Ok(HubName::Build)
        } else if s.eq_ignore_ascii_case("gates") {
            Ok(HubName::Gates)
        } else {
            Err(RequestError::InvalidHubName(s.to_string()))
        }
    }
}

/// Validated orchestration identifiers for one asynchronous request.
#[derive(Clone, PartialEq, Eq)]
pub struct TaskProperties {
    /// Organization/collection URL, without a trailing slash.
    pub host_url: String,
    pub project_id: Uuid,
    pub hub_name: HubName,
    pub plan_id: Uuid,
    pub job_id: Uuid,
    pub timeline_id: Uuid,
    pub check_suite_id: Uuid,
    pub auth_token: String,
}

impl fmt::Debug for TaskProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskProperties")
            .field("host_url", &self.host_url)
            .field("project_id", &self.project_id)
            .field("hub_name", &self.hub_name)
            .field("plan_id", &self.plan_id)
            .field("job_id", &self.job_id)
            .field("timeline_id", &self.timeline_id)
            .field("check_suite_id", &self.check_suite_id)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}
