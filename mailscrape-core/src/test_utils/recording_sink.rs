//! A delivery sink that remembers every call

use crate::delivery::{DeliveryError, DeliverySink, DeliverySummary};
use crate::orchestrator::RequestId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One call made against a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Post(String),
    Update(String),
    /// `contents` is the file as it was at delivery time
    Deliver {
        path: PathBuf,
        caption: DeliverySummary,
        contents: String,
    },
    Clear,
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(RequestId, SinkCall)>>,
    fail_delivery: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose `deliver_file` always fails after recording the call
    pub fn failing_delivery() -> Self {
        Self {
            fail_delivery: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(RequestId, SinkCall)> {
        self.lock().clone()
    }

    pub fn calls_for(&self, request_id: RequestId) -> Vec<SinkCall> {
        self.lock()
            .iter()
            .filter(|(id, _)| *id == request_id)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn deliveries(&self) -> usize {
        self.lock()
            .iter()
            .filter(|(_, call)| matches!(call, SinkCall::Deliver { .. }))
            .count()
    }

    /// Delivered file paths, in call order
    pub fn delivered_paths(&self) -> Vec<PathBuf> {
        self.lock()
            .iter()
            .filter_map(|(_, call)| match call {
                SinkCall::Deliver { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(RequestId, SinkCall)>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, request_id: RequestId, call: SinkCall) {
        self.lock().push((request_id, call));
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn post_status(&self, request_id: RequestId, text: &str) -> Result<(), DeliveryError> {
        self.record(request_id, SinkCall::Post(text.to_string()));
        Ok(())
    }

    async fn update_status(
        &self,
        request_id: RequestId,
        text: &str,
    ) -> Result<(), DeliveryError> {
        self.record(request_id, SinkCall::Update(text.to_string()));
        Ok(())
    }

    async fn deliver_file(
        &self,
        request_id: RequestId,
        path: &Path,
        caption: &DeliverySummary,
    ) -> Result<(), DeliveryError> {
        let contents = tokio::fs::read_to_string(path).await.unwrap_or_default();
        self.record(
            request_id,
            SinkCall::Deliver {
                path: path.to_path_buf(),
                caption: caption.clone(),
                contents,
            },
        );
        if self.fail_delivery {
            return Err(DeliveryError::Rejected("recording sink set to fail".to_string()));
        }
        Ok(())
    }

    async fn clear_status(&self, request_id: RequestId) -> Result<(), DeliveryError> {
        self.record(request_id, SinkCall::Clear);
        Ok(())
    }
}
