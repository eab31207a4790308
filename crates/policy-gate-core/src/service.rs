//! Request dispatch: inline evaluation or background evaluate-and-report.

use std::sync::Arc;

use anyhow::Context;
use checks_client::{
    CheckRunApi, CheckSuiteReporter, ChecksConfig, HttpCheckRunClient, HttpTimelineFeed,
    ReportOutcome, RetryPolicy, TimelineFeed, TimelineLogger,
};
use policy_gate_domain::{
    DiagnosticLog, EvaluationRequest, EvaluationResponse, TaskProperties, Variables,
};
use policy_gate_eval::{EvaluationContext, EvaluatorConfig, PolicyEvaluator};
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::obs;

/// Opens remote clients for one asynchronous request.
pub trait RemoteConnector: Send + Sync {
    fn check_runs(&self, props: &TaskProperties) -> checks_client::Result<Arc<dyn CheckRunApi>>;

    fn timeline(&self, props: &TaskProperties) -> checks_client::Result<Arc<dyn TimelineFeed>>;
}

/// Connector for the pipelines REST API.
pub struct HttpConnector {
    config: ChecksConfig,
}

impl HttpConnector {
    pub fn new(config: ChecksConfig) -> Self {
        Self { config }
    }
}

impl RemoteConnector for HttpConnector {
    fn check_runs(&self, props: &TaskProperties) -> checks_client::Result<Arc<dyn CheckRunApi>> {
        Ok(Arc::new(HttpCheckRunClient::new(props, &self.config)?))
    }

    fn timeline(&self, props: &TaskProperties) -> checks_client::Result<Arc<dyn TimelineFeed>> {
        Ok(Arc::new(HttpTimelineFeed::new(props, &self.config)?))
    }
}

/// What `handle` did with a request.
#[derive(Debug)]
pub enum Dispatch {
    /// Evaluated inline; the response carries the verdict and buffered logs.
    Completed(EvaluationResponse),

    /// Acknowledged; evaluation and reporting continue in the background.
    ///
    /// The handle is only for hosts that must drain work before exiting.
    /// It resolves to `None` when the task failed before reporting.
    Accepted {
        invocation_id: Uuid,
        handle: JoinHandle<Option<ReportOutcome>>,
    },
}

/// Entry point for evaluation requests.
#[derive(Clone)]
pub struct PolicyCheckService {
    evaluator: PolicyEvaluator,
    connector: Arc<dyn RemoteConnector>,
    retry: RetryPolicy,
}

impl PolicyCheckService {
    pub fn new(evaluator: EvaluatorConfig, checks: ChecksConfig) -> Self {
        let retry = checks.retry_policy();
        Self::with_connector(evaluator, Arc::new(HttpConnector::new(checks)), retry)
    }

    pub fn from_env() -> Self {
        Self::new(EvaluatorConfig::from_env(), ChecksConfig::from_env())
    }

    pub fn with_connector(
        evaluator: EvaluatorConfig,
        connector: Arc<dyn RemoteConnector>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            evaluator: PolicyEvaluator::new(evaluator),
            connector,
            retry,
        }
    }

    pub fn evaluator(&self) -> &PolicyEvaluator {
        &self.evaluator
    }

    /// Validate and dispatch a request.
    ///
    /// Requests with an auth token must carry every orchestration id and are
    /// acknowledged immediately. All others are evaluated before returning.
    pub async fn handle(&self, request: EvaluationRequest) -> Result<Dispatch> {
        request.validate()?;
        let ctx = EvaluationContext::new(self.evaluator.config().work_dir.clone());

        if !request.is_asynchronous() {
            let response = self
                .evaluate_inline(&request, &ctx)
                .instrument(obs::invocation_span(&ctx.invocation_id()))
                .await?;
            return Ok(Dispatch::Completed(response));
        }

        let props = request.task_properties()?;
        let evidence = request.evidence_json()?;
        let invocation_id = ctx.invocation_id();
        obs::emit_evaluation_started(&invocation_id, true);
        info!(%invocation_id, check_id = %props.check_suite_id, "Accepted asynchronous evaluation");

        let task = BackgroundTask {
            evaluator: self.evaluator.clone(),
            connector: self.connector.clone(),
            retry: self.retry,
            evidence,
            policy: request.policy().to_string(),
            variables: request.variables(),
            props,
            ctx,
        };
        let handle = tokio::spawn(task.run().instrument(obs::invocation_span(&invocation_id)));

        Ok(Dispatch::Accepted {
            invocation_id,
            handle,
        })
    }

    async fn evaluate_inline(
        &self,
        request: &EvaluationRequest,
        ctx: &EvaluationContext,
    ) -> Result<EvaluationResponse> {
        let invocation_id = ctx.invocation_id();
        obs::emit_evaluation_started(&invocation_id, false);

        let log = DiagnosticLog::new(&request.variables()).with_buffer();
        let evidence = request.evidence_json()?;
        let verdict = self
            .evaluator
            .evaluate(&evidence, request.policy(), ctx, &log)
            .await?;

        obs::emit_evaluation_finished(
            &invocation_id,
            verdict.kind(),
            verdict.violations().len(),
            ctx.elapsed_ms(),
        );
        Ok(verdict.into_response(log.buffered()))
    }
}

/// Everything the background task owns. Nothing is shared with the
/// acknowledging caller.
struct BackgroundTask {
    evaluator: PolicyEvaluator,
    connector: Arc<dyn RemoteConnector>,
    retry: RetryPolicy,
    evidence: String,
    policy: String,
    variables: Variables,
    props: TaskProperties,
    ctx: EvaluationContext,
}

impl BackgroundTask {
    async fn run(self) -> Option<ReportOutcome> {
        let invocation_id = self.ctx.invocation_id();

        let timeline = match self.connector.timeline(&self.props) {
            Ok(feed) => Some(TimelineLogger::start(feed, self.retry)),
            Err(e) => {
                warn!(%invocation_id, error = %e, "Timeline unavailable, logging locally only");
                None
            }
        };
        let mut log = DiagnosticLog::new(&self.variables);
        if let Some(timeline) = &timeline {
            log = log.with_timeline(timeline.clone());
        }

        let outcome = match self.evaluate_and_report(&log).await {
            Ok(outcome) => {
                obs::emit_report_finished(&invocation_id, &self.props.check_suite_id, &outcome);
                Some(outcome)
            }
            Err(e) => {
                log.log_always(&format!(
                    "Policy evaluation failed with error : {:#}",
                    e
                ));
                obs::emit_background_failed(&invocation_id, &format!("{:#}", e));
                None
            }
        };

        if let Some(timeline) = timeline {
            timeline.end().await;
        }
        outcome
    }

    async fn evaluate_and_report(&self, log: &DiagnosticLog) -> anyhow::Result<ReportOutcome> {
        let invocation_id = self.ctx.invocation_id();
        log.log_always(&format!(
            "Initializing evaluation. Execution id - {}",
            invocation_id
        ));

        let verdict = self
            .evaluator
            .evaluate(&self.evidence, &self.policy, &self.ctx, log)
            .await
            .context("evaluator could not be run")?;
        obs::emit_evaluation_finished(
            &invocation_id,
            verdict.kind(),
            verdict.violations().len(),
            self.ctx.elapsed_ms(),
        );

        let succeeded = verdict.succeeded();
        log.log_always(&format!("Policy check succeeded: {}", succeeded));

        let api = self
            .connector
            .check_runs(&self.props)
            .context("could not create check-run client")?;
        let reporter = CheckSuiteReporter::new(api, self.retry);
        Ok(reporter
            .report(self.props.check_suite_id, succeeded, verdict.log(), log)
            .await)
    }
}
