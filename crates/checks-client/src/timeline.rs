//! Timeline feed: live log lines shown on the pipeline job.
//!
//! `TimelineLogger` takes lines synchronously through `TimelineSink` and
//! ships them in batches from a background task, so logging never waits on
//! the network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use policy_gate_domain::{TaskProperties, TimelineSink};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ChecksConfig;
use crate::error::ChecksError;
use crate::retry::RetryPolicy;
use crate::Result;

/// Append-only access to one job's timeline feed.
#[async_trait]
pub trait TimelineFeed: Send + Sync {
    async fn append_lines(&self, lines: &[String]) -> Result<()>;
}

#[derive(Serialize)]
struct FeedBody<'a> {
    value: &'a [String],
    count: usize,
}

/// Timeline feed over the distributed-task REST API.
pub struct HttpTimelineFeed {
    http: reqwest::Client,
    url: String,
    auth_token: String,
    api_version: String,
}

impl HttpTimelineFeed {
    pub fn new(props: &TaskProperties, config: &ChecksConfig) -> Result<Self> {
        if !props.host_url.starts_with("http://") && !props.host_url.starts_with("https://") {
            return Err(ChecksError::Url(props.host_url.clone()));
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            http,
            url: Self::feed_url(props),
            auth_token: props.auth_token.clone(),
            api_version: config.api_version.clone(),
        })
    }

    /// Feed URL of the job record named by `props`.
    pub fn feed_url(props: &TaskProperties) -> String {
        format!(
            "{}/{}/_apis/distributedtask/hubs/{}/plans/{}/timelines/{}/records/{}/feed",
            props.host_url.trim_end_matches('/'),
            props.project_id,
            props.hub_name,
            props.plan_id,
            props.timeline_id,
            props.job_id
        )
    }
}

#[async_trait]
impl TimelineFeed for HttpTimelineFeed {
    async fn append_lines(&self, lines: &[String]) -> Result<()> {
        let body = serde_json::to_vec(&FeedBody {
            value: lines,
            count: lines.len(),
        })?;

        let response = self
            .http
            .post(&self.url)
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
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Buffered, non-blocking writer in front of a `TimelineFeed`.
///
/// Must be created inside a Tokio runtime. Lines appended after `end` are
/// dropped.
pub struct TimelineLogger {
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TimelineLogger {
    pub fn start(feed: Arc<dyn TimelineFeed>, retry: RetryPolicy) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(drain(feed, retry, receiver));

        Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop accepting lines and wait until everything queued is delivered
    /// (or given up on).
    pub async fn end(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "Timeline writer task failed");
            }
        }
    }
}

impl TimelineSink for TimelineLogger {
    fn append(&self, line: &str) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(sender) if sender.send(line.to_string()).is_ok() => {}
            _ => debug!("Timeline logger closed, dropping line"),
        }
    }
}

async fn drain(
    feed: Arc<dyn TimelineFeed>,
    retry: RetryPolicy,
    mut receiver: mpsc::UnboundedReceiver<String>,
) {
    while let Some(first) = receiver.recv().await {
        let mut batch = vec![first];
        while let Ok(line) = receiver.try_recv() {
            batch.push(line);
        }

        let result = retry
            .invoke("timeline.append", || feed.append_lines(&batch))
            .await;
        if let Err(e) = result {
            warn!(lines = batch.len(), error = %e, "Dropping timeline lines");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryTimeline;
    use policy_gate_domain::HubName;
    use uuid::Uuid;

    #[test]
    fn test_feed_url() {
        let id = |n: u8| Uuid::from_bytes([n; 16]);
        let props = TaskProperties {
            host_url: "https://dev.example.com/org".to_string(),
            project_id: id(1),
            hub_name: HubName::Gates,
            plan_id: id(2),
            job_id: id(3),
            timeline_id: id(4),
            check_suite_id: id(5),
            auth_token: "token".to_string(),
        };
        let url = HttpTimelineFeed::feed_url(&props);
        assert_eq!(
            url,
            format!(
                "https://dev.example.com/org/{}/_apis/distributedtask/hubs/Gates/plans/{}/timelines/{}/records/{}/feed",
                id(1),
                id(2),
                id(4),
                id(3)
            )
        );
    }

    #[test]
    fn test_feed_body_shape() {
        let lines = vec!["a".to_string(), "b".to_string()];
        let value = serde_json::to_value(FeedBody {
            value: &lines,
            count: lines.len(),
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"value": ["a", "b"], "count": 2}));
    }

    #[tokio::test]
    async fn test_logger_delivers_lines_in_order() {
        let feed = Arc::new(MemoryTimeline::new());
        let logger = TimelineLogger::start(feed.clone(), RetryPolicy::default());

        logger.append("first");
        logger.append("second");
        logger.append("third");
        logger.end().await;

        assert_eq!(feed.lines(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_lines_after_end_are_dropped() {
        let feed = Arc::new(MemoryTimeline::new());
        let logger = TimelineLogger::start(feed.clone(), RetryPolicy::default());

        logger.append("kept");
        logger.end().await;
        logger.append("late");
        logger.end().await;

        assert_eq!(feed.lines(), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_transient_feed_failures_are_retried() {
        let feed = Arc::new(MemoryTimeline::new());
        feed.fail_next(2);
        let logger = TimelineLogger::start(feed.clone(), RetryPolicy::new(5));

        logger.append("eventually");
        logger.end().await;

        assert_eq!(feed.lines(), vec!["eventually"]);
    }

    #[tokio::test]
    async fn test_persistent_feed_failure_does_not_block_end() {
        let feed = Arc::new(MemoryTimeline::new());
        feed.fail_next(100);
        let logger = TimelineLogger::start(feed.clone(), RetryPolicy::new(2));

        logger.append("lost");
        logger.end().await;

        assert!(feed.lines().is_empty());
    }
}
