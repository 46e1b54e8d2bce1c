use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::broker::BrokerPort;
use crate::engine::approval::ApprovalHandler;

use super::order::OrderRequest;

/// Lowest / highest accepted task priority; higher is served first.
pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

/// One order awaiting or undergoing execution.
///
/// The orchestrator owns exclusive write access while a task is active;
/// a task is never mutated by more than one loop iteration concurrently.
pub struct ExecutionTask {
    /// Unique identifier, generated at creation, immutable
    pub task_id: Uuid,
    /// The order's business payload, shared with the caller
    pub request: Arc<OrderRequest>,
    /// Broker this task must use
    pub broker: Arc<dyn BrokerPort>,
    /// 1-10, higher means served first
    pub priority: u8,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    /// Whether a human must approve before submission
    pub manual_approval: bool,
    /// Capability invoked to obtain approval; absent means the engine's
    /// own auto-approve path
    pub approval: Option<Arc<dyn ApprovalHandler>>,
    /// Advisory payload carried through to approval and persistence,
    /// never interpreted by the engine
    pub analysis: Option<serde_json::Value>,
}

impl ExecutionTask {
    pub fn new(request: Arc<OrderRequest>, broker: Arc<dyn BrokerPort>, priority: u8) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            request,
            broker,
            priority: priority.clamp(MIN_PRIORITY, MAX_PRIORITY),
            retry_count: 0,
            max_retries: 3,
            created_at: Utc::now(),
            manual_approval: false,
            approval: None,
            analysis: None,
        }
    }

    /// Time elapsed since the task was created.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the task aged out of the queue before being executed.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.age() > timeout
    }

    pub fn has_retries_left(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

impl std::fmt::Debug for ExecutionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionTask")
            .field("task_id", &self.task_id)
            .field("symbol", &self.request.symbol)
            .field("side", &self.request.side)
            .field("broker", &self.broker.name())
            .field("priority", &self.priority)
            .field("retry_count", &self.retry_count)
            .field("manual_approval", &self.manual_approval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::PaperBroker;
    use crate::domain::order::OrderSide;
    use rust_decimal_macros::dec;

    fn make_task(priority: u8) -> ExecutionTask {
        let request = Arc::new(OrderRequest::limit(
            "ETHUSDT",
            OrderSide::Buy,
            dec!(1),
            dec!(2500),
        ));
        ExecutionTask::new(request, Arc::new(PaperBroker::new("paper")), priority)
    }

    #[test]
    fn test_priority_clamped() {
        assert_eq!(make_task(0).priority, MIN_PRIORITY);
        assert_eq!(make_task(5).priority, 5);
        assert_eq!(make_task(42).priority, MAX_PRIORITY);
    }

    #[test]
    fn test_retry_budget() {
        let mut task = make_task(5);
        task.max_retries = 2;
        assert!(task.has_retries_left());
        task.retry_count = 2;
        assert!(!task.has_retries_left());
    }

    #[test]
    fn test_fresh_task_not_expired() {
        let task = make_task(5);
        assert!(!task.is_expired(Duration::from_secs(60)));
        assert!(task.is_expired(Duration::ZERO));
    }
}
