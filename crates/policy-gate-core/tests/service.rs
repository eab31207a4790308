//! Dispatch tests: synchronous responses and the background report lifecycle.
//!
//! The evaluator is `sh -c <script>`; remote services are in-memory fakes.

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;

use checks_client::fakes::{MemoryCheckRuns, MemoryTimeline};
use checks_client::{CheckRunApi, CheckRunStatus, ChecksError, TimelineFeed};
use policy_gate_core::{
    Dispatch, EvaluationRequest, EvaluatorConfig, GateError, PolicyCheckService, RemoteConnector,
    ReportOutcome, RequestError, RetryPolicy, ViolationKind,
};
use policy_gate_domain::TaskProperties;
use serde_json::json;
use uuid::Uuid;

const POLICY: &str = "package artifacts.policy\n\nviolations[msg] { msg := \"unsigned\" }\n";

struct FakeConnector {
    runs: Arc<MemoryCheckRuns>,
    timeline: Arc<MemoryTimeline>,
    timeline_available: bool,
}

impl FakeConnector {
    fn new() -> Self {
        Self {
            runs: Arc::new(MemoryCheckRuns::new()),
            timeline: Arc::new(MemoryTimeline::new()),
            timeline_available: true,
        }
    }
}

impl RemoteConnector for FakeConnector {
    fn check_runs(&self, _props: &TaskProperties) -> checks_client::Result<Arc<dyn CheckRunApi>> {
        Ok(self.runs.clone())
    }

    fn timeline(&self, props: &TaskProperties) -> checks_client::Result<Arc<dyn TimelineFeed>> {
        if self.timeline_available {
            Ok(self.timeline.clone())
        } else {
            Err(ChecksError::Url(props.host_url.clone()))
        }
    }
}

fn service(base: &Path, script: &str, connector: Arc<FakeConnector>) -> PolicyCheckService {
    let evaluator = EvaluatorConfig::new("sh", base).with_leading_args(["-c", script, "opa"]);
    PolicyCheckService::with_connector(evaluator, connector, RetryPolicy::default())
}

fn sync_request(debug: bool) -> EvaluationRequest {
    EvaluationRequest::from_json(
        &json!({
            "imageProvenance": [{"image": "nginx:1.25", "signed": false}],
            "policyData": POLICY,
            "variables": {"System.Debug": debug.to_string()}
        })
        .to_string(),
    )
    .unwrap()
}

fn async_request(check_id: Uuid) -> EvaluationRequest {
    EvaluationRequest::from_json(
        &json!({
            "imageProvenance": [{"image": "nginx:1.25", "signed": false}],
            "policyData": POLICY,
            "hostUrl": "https://dev.example.com/org/",
            "projectId": Uuid::new_v4(),
            "planId": Uuid::new_v4(),
            "jobId": Uuid::new_v4(),
            "timelineId": Uuid::new_v4(),
            "checkSuiteId": check_id,
            "hubName": "Gates",
            "authToken": "secret"
        })
        .to_string(),
    )
    .unwrap()
}

async fn finish(dispatch: Dispatch) -> Option<ReportOutcome> {
    match dispatch {
        Dispatch::Accepted { handle, .. } => handle.await.unwrap(),
        Dispatch::Completed(response) => panic!("expected Accepted, got {:?}", response),
    }
}

/// Test: synchronous request returns the verdict with buffered logs
#[tokio::test]
async fn test_sync_request_returns_response() {
    let base = tempfile::tempdir().unwrap();
    let connector = Arc::new(FakeConnector::new());
    let service = service(base.path(), r#"printf '[\n  "unsigned"\n]'"#, connector.clone());

    let dispatch = service.handle(sync_request(false)).await.unwrap();

    let Dispatch::Completed(response) = dispatch else {
        panic!("expected Completed");
    };
    assert_eq!(response.violation_type, ViolationKind::ViolationsPresent);
    assert_eq!(response.violations, vec!["\"unsigned\"".to_string()]);
    assert!(response.logs.starts_with("Initiating evaluation\r\n"));
    assert!(!response.logs.contains("Package name"));
    assert!(connector.runs.updates().is_empty());
    assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
}

/// Test: debug variable adds verbose steps to the synchronous logs
#[tokio::test]
async fn test_sync_request_debug_logs() {
    let base = tempfile::tempdir().unwrap();
    let service = service(base.path(), "printf '[]'", Arc::new(FakeConnector::new()));

    let Dispatch::Completed(response) = service.handle(sync_request(true)).await.unwrap() else {
        panic!("expected Completed");
    };
    assert_eq!(response.violation_type, ViolationKind::None);
    assert!(response.logs.starts_with("Package name : artifacts.policy\r\n"));
    assert!(response.logs.contains("--explain full"));
}

/// Test: invalid requests are rejected before any work
#[tokio::test]
async fn test_empty_evidence_is_rejected() {
    let base = tempfile::tempdir().unwrap();
    let service = service(base.path(), "exit 99", Arc::new(FakeConnector::new()));

    let request = EvaluationRequest::new(vec![], POLICY);
    let err = service.handle(request).await.unwrap_err();

    assert!(matches!(err, GateError::Request(RequestError::EmptyEvidence)));
    assert!(err.is_rejection());
    assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
}

/// Test: async request without every id is rejected synchronously
#[tokio::test]
async fn test_async_request_requires_ids() {
    let base = tempfile::tempdir().unwrap();
    let service = service(base.path(), "printf '[]'", Arc::new(FakeConnector::new()));

    let mut request = async_request(Uuid::new_v4());
    request.job_id = None;
    let err = service.handle(request).await.unwrap_err();

    match err {
        GateError::Request(RequestError::MissingProperties(missing)) => {
            assert_eq!(missing, vec!["JobId"]);
        }
        other => panic!("expected MissingProperties, got {:?}", other),
    }
}

/// Test: async request approves a running check and streams lifecycle lines
#[tokio::test]
async fn test_async_request_reports_approval() {
    let base = tempfile::tempdir().unwrap();
    let connector = Arc::new(FakeConnector::new());
    let check_id = Uuid::new_v4();
    connector.runs.insert(check_id, CheckRunStatus::Running);
    let service = service(base.path(), "printf '[]'", connector.clone());

    let dispatch = service.handle(async_request(check_id)).await.unwrap();
    let outcome = finish(dispatch).await;

    assert_eq!(outcome, Some(ReportOutcome::Written));
    let run = connector.runs.get(check_id).unwrap();
    assert_eq!(run.status, Some(CheckRunStatus::Approved));
    assert_eq!(run.result_message.as_deref(), Some("[]"));

    let lines = connector.timeline.lines();
    assert!(lines[0].starts_with("Initializing evaluation. Execution id - "));
    assert!(lines.contains(&"Initiating evaluation".to_string()));
    assert!(lines.contains(&"Policy check succeeded: true".to_string()));
    assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
}

/// Test: violations reject the check with the output log as message
#[tokio::test]
async fn test_async_request_reports_rejection() {
    let base = tempfile::tempdir().unwrap();
    let connector = Arc::new(FakeConnector::new());
    let check_id = Uuid::new_v4();
    connector.runs.insert(check_id, CheckRunStatus::Running);
    let service = service(base.path(), r#"printf '[\n  "unsigned"\n]'"#, connector.clone());

    let outcome = finish(service.handle(async_request(check_id)).await.unwrap()).await;

    assert_eq!(outcome, Some(ReportOutcome::Written));
    let run = connector.runs.get(check_id).unwrap();
    assert_eq!(run.status, Some(CheckRunStatus::Rejected));
    assert_eq!(run.result_message.as_deref(), Some("[\r\n  \"unsigned\"\r\n]"));
}

/// Test: an already finalized check is left alone
#[tokio::test]
async fn test_async_request_skips_finalized_check() {
    let base = tempfile::tempdir().unwrap();
    let connector = Arc::new(FakeConnector::new());
    let check_id = Uuid::new_v4();
    connector.runs.insert(check_id, CheckRunStatus::Rejected);
    let service = service(base.path(), "printf '[]'", connector.clone());

    let outcome = finish(service.handle(async_request(check_id)).await.unwrap()).await;

    assert_eq!(
        outcome,
        Some(ReportOutcome::Skipped {
            status: Some(CheckRunStatus::Rejected)
        })
    );
    assert!(connector.runs.updates().is_empty());
}

/// Test: evaluator launch failure is logged to the timeline, nothing is reported
#[tokio::test]
async fn test_background_failure_is_logged_not_reported() {
    let base = tempfile::tempdir().unwrap();
    let connector = Arc::new(FakeConnector::new());
    let check_id = Uuid::new_v4();
    connector.runs.insert(check_id, CheckRunStatus::Running);
    let service = PolicyCheckService::with_connector(
        EvaluatorConfig::new("/nonexistent/bin/opa", base.path()),
        connector.clone(),
        RetryPolicy::default(),
    );

    let outcome = finish(service.handle(async_request(check_id)).await.unwrap()).await;

    assert_eq!(outcome, None);
    assert!(connector.runs.updates().is_empty());
    let lines = connector.timeline.lines();
    assert!(lines
        .iter()
        .any(|l| l.starts_with("Policy evaluation failed with error : ")));
    assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
}

/// Test: reporting still happens when the timeline cannot be opened
#[tokio::test]
async fn test_report_without_timeline() {
    let base = tempfile::tempdir().unwrap();
    let connector = Arc::new(FakeConnector {
        timeline_available: false,
        ..FakeConnector::new()
    });
    let check_id = Uuid::new_v4();
    connector.runs.insert(check_id, CheckRunStatus::Running);
    let service = service(base.path(), "printf '[]'", connector.clone());

    let outcome = finish(service.handle(async_request(check_id)).await.unwrap()).await;

    assert_eq!(outcome, Some(ReportOutcome::Written));
    assert!(connector.timeline.lines().is_empty());
}
