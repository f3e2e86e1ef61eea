//! Grade publishing to the host course runtime

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use crate::error::{Error, Result};

/// One grade event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeEvent {
    pub user_id: String,
    pub block_id: String,
    /// Points earned, `0 <= value <= max_value`
    pub value: f64,
    pub max_value: f64,
}

/// Receives every accepted score change
#[async_trait]
pub trait GradePublisher: Send + Sync {
    async fn publish(&self, grade: &GradeEvent) -> Result<()>;
}

/// Publisher used when no host endpoint is configured
pub struct LogGradePublisher;

#[async_trait]
impl GradePublisher for LogGradePublisher {
    async fn publish(&self, grade: &GradeEvent) -> Result<()> {
        info!(
            user_id = %grade.user_id,
            block_id = %grade.block_id,
            value = grade.value,
            max_value = grade.max_value,
            "Grade published"
        );
        Ok(())
    }
}

/// POSTs each grade as JSON to the host's grading endpoint
pub struct HttpGradePublisher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGradePublisher {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::GradePublish(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl GradePublisher for HttpGradePublisher {
    async fn publish(&self, grade: &GradeEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(grade)
            .send()
            .await
            .map_err(|e| Error::GradePublish(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::GradePublish(format!(
                "{} responded {}",
                self.endpoint, status
            )));
        }
        info!(
            user_id = %grade.user_id,
            block_id = %grade.block_id,
            value = grade.value,
            "Grade delivered to host"
        );
        Ok(())
    }
}

/// Keeps every published grade in memory; for tests and local tooling
#[derive(Default)]
pub struct RecordingGradePublisher {
    events: Mutex<Vec<GradeEvent>>,
    fail: bool,
}

impl RecordingGradePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher that rejects every grade
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<GradeEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GradePublisher for RecordingGradePublisher {
    async fn publish(&self, grade: &GradeEvent) -> Result<()> {
        if self.fail {
            return Err(Error::GradePublish("host unavailable".to_string()));
        }
        self.events
            .lock()
            .map_err(|_| Error::GradePublish("recorder poisoned".to_string()))?
            .push(grade.clone());
        Ok(())
    }
}
