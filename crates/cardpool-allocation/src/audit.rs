//! Fire-and-forget recording of operation outcomes and remote calls.

use crate::background::{BackgroundQueue, Job};
use cardpool_network::{ApiCallRecord, CallObserver};
use cardpool_storage::{ApiCallLog, BindingUpdate, CallStatus, OperationLog, OperationResult, OperationType};
use serde_json::Value;
use tracing::debug;

/// Records audit entries through the background queue
///
/// Every method returns immediately; persistence happens on the queue's
/// worker and failures end up in its dead-letter buffer.
#[derive(Clone)]
pub struct AuditLogWriter {
    queue: BackgroundQueue,
}

impl AuditLogWriter {
    pub fn new(queue: BackgroundQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &BackgroundQueue {
        &self.queue
    }

    /// Queue an audit record on its own
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        operation_type: OperationType,
        user_id: &str,
        imsi: Option<&str>,
        request: &Value,
        response: &Value,
        result: OperationResult,
        remarks: Option<String>,
    ) {
        let audit = OperationLog::new(
            operation_type,
            Some(user_id.to_string()),
            imsi.map(str::to_string),
            request,
            response,
            result,
            remarks,
        );
        self.settle(None, audit);
    }

    /// Queue a binding change followed by its audit record
    pub fn settle(&self, binding: Option<BindingUpdate>, audit: OperationLog) {
        debug!(
            operation = %audit.operation_type,
            result = %audit.result,
            has_binding = binding.is_some(),
            "Queueing settlement"
        );
        self.queue.submit(Job::Settle { binding, audit });
    }
}

impl CallObserver for AuditLogWriter {
    fn on_call(&self, record: ApiCallRecord) {
        self.queue.submit(Job::RecordApiCall(api_call_log(record)));
    }
}

fn api_call_log(record: ApiCallRecord) -> ApiCallLog {
    let status = if record.succeeded {
        CallStatus::Success
    } else {
        CallStatus::Failed
    };

    ApiCallLog {
        id: 0,
        execution_time_ms: record.elapsed_ms(),
        api_path: record.path,
        method: record.method.to_string(),
        request_params: Some(record.request.to_string()),
        response_code: record.response_code,
        response_data: record.response.map(|body| body.to_string()),
        request_time: record.requested_at,
        response_time: record.responded_at,
        status: status.as_str().to_string(),
        error_message: record.error,
    }
}
