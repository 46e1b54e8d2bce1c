//! Execution engine - the order execution orchestrator.
//!
//! Accepts order requests, gates them through duplicate- and
//! risk-checks, queues them by priority, optionally requires human
//! approval, submits them to a broker, retries transient failures with
//! exponential backoff, and can halt all activity instantly via a kill
//! switch.

pub mod approval;
pub mod dedup;
pub mod queue;

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::BrokerPort;
use crate::config::EngineConfig;
use crate::domain::{EngineState, ExecutionTask, OrderRecord, OrderRequest, OrderSide};
use crate::events::{Event, EventBus, EventPayload};
use crate::error::SubmitError;
use crate::persistence::OrderStore;
use crate::risk::{RiskGate, RiskSnapshot, RiskTracker};

use approval::ApprovalHandler;
use dedup::DuplicateFilter;
use queue::TaskQueue;

/// Originating-component tag on published events.
const SOURCE: &str = "execution_engine";

/// Per-call options for `submit_order`.
#[derive(Default)]
pub struct SubmitOptions {
    /// 1-10; defaults to the configured mid-range priority
    pub priority: Option<u8>,
    /// Overrides the configured manual-approval default
    pub manual_approval: Option<bool>,
    /// Capability invoked to obtain approval; absent means the
    /// engine's auto-approve path
    pub approval: Option<Arc<dyn ApprovalHandler>>,
    /// Advisory payload carried to approval and persistence
    pub analysis: Option<serde_json::Value>,
    /// Overrides the configured retry budget
    pub max_retries: Option<u32>,
}

impl SubmitOptions {
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_manual_approval(mut self, manual: bool) -> Self {
        self.manual_approval = Some(manual);
        self
    }

    pub fn with_approval(mut self, handler: Arc<dyn ApprovalHandler>) -> Self {
        self.approval = Some(handler);
        self
    }

    pub fn with_analysis(mut self, analysis: serde_json::Value) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Engine counters for monitoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    /// Submissions accepted into the queue
    pub submitted: u64,
    /// Tasks that completed a broker call successfully
    pub executed: u64,
    /// Tasks dropped after exhausting retries or on permanent failure
    pub failed: u64,
    /// Retry attempts performed
    pub retries: u64,
    /// Tasks that aged out of the queue before execution
    pub expired: u64,
    /// Pending tasks discarded by stop or kill switch
    pub discarded: u64,
    /// Tasks dropped because approval was not granted
    pub disapproved: u64,
}

/// A task currently undergoing execution, indexed by task id.
///
/// Keyed as a map so a bounded worker pool could be added later
/// without a data-model change; the reference loop still executes one
/// task at a time.
struct ActiveOrder {
    symbol: String,
    broker: Arc<dyn BrokerPort>,
    broker_order_id: Option<String>,
}

/// The order execution orchestrator.
pub struct ExecutionEngine {
    config: EngineConfig,
    state: RwLock<EngineState>,
    /// Fast-path flag checked before any lock is taken
    killed: AtomicBool,
    queue: Mutex<TaskQueue>,
    dedup: Mutex<DuplicateFilter>,
    active: Mutex<HashMap<Uuid, ActiveOrder>>,
    risk: RiskTracker,
    risk_gate: Option<Arc<dyn RiskGate>>,
    bus: Arc<EventBus>,
    store: Option<Arc<dyn OrderStore>>,
    stats: Mutex<EngineStats>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionEngine {
    pub fn new(config: EngineConfig, bus: Arc<EventBus>) -> Self {
        let risk = RiskTracker::new(config.max_loss_per_day, config.max_drawdown_percent);
        Self {
            queue: Mutex::new(TaskQueue::new(config.max_pending_orders)),
            dedup: Mutex::new(DuplicateFilter::new(config.duplicate_window_secs)),
            active: Mutex::new(HashMap::new()),
            state: RwLock::new(EngineState::Idle),
            killed: AtomicBool::new(false),
            risk,
            risk_gate: None,
            bus,
            store: None,
            stats: Mutex::new(EngineStats::default()),
            loop_handle: Mutex::new(None),
            config,
        }
    }

    /// Install a pre-trade risk gate.
    pub fn with_risk_gate(mut self, gate: Arc<dyn RiskGate>) -> Self {
        self.risk_gate = Some(gate);
        self
    }

    /// Install an order-record store.
    pub fn with_store(mut self, store: Arc<dyn OrderStore>) -> Self {
        self.store = Some(store);
        self
    }

    // ==================== Lifecycle ====================

    /// Start the processing loop. Requires `Idle` (or `Stopped` for a
    /// restart); from any other state this is a warn-logged no-op.
    ///
    /// Takes an `Arc` receiver because the loop runs as a background
    /// task holding its own handle to the engine: `engine.clone().start()`.
    pub fn start(self: Arc<Self>) {
        {
            let mut state = self.state.write().unwrap();
            match *state {
                EngineState::Idle | EngineState::Stopped => *state = EngineState::Running,
                other => {
                    warn!("start() ignored: engine is {}", other);
                    return;
                }
            }
        }

        // A previous loop may still be winding down after a stop or
        // kill-switch deactivation; there must never be two consumers.
        if let Some(old) = self.loop_handle.lock().unwrap().take() {
            old.abort();
        }

        let engine = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            engine.run_loop().await;
        });
        *self.loop_handle.lock().unwrap() = Some(handle);

        self.publish(EventPayload::EngineStarted {
            max_pending_orders: self.config.max_pending_orders,
        });
        info!("Execution engine started");
    }

    /// Stop the engine: cancel the loop, drain and discard all pending
    /// tasks.
    pub fn stop(&self) {
        *self.state.write().unwrap() = EngineState::Stopped;

        if let Some(handle) = self.loop_handle.lock().unwrap().take() {
            handle.abort();
        }

        let drained = self.queue.lock().unwrap().drain();
        for task in &drained {
            warn!(
                "Discarding pending task {} ({} {} {})",
                task.task_id, task.request.side, task.request.quantity, task.request.symbol
            );
        }
        self.stats.lock().unwrap().discarded += drained.len() as u64;

        info!("Execution engine stopped, {} pending tasks discarded", drained.len());
    }

    /// Pause queue consumption; pending tasks are preserved.
    pub fn pause(&self) {
        let mut state = self.state.write().unwrap();
        if *state == EngineState::Running {
            *state = EngineState::Paused;
            info!("Execution engine paused");
        } else {
            warn!("pause() ignored: engine is {}", *state);
        }
    }

    /// Resume queue consumption.
    pub fn resume(&self) {
        let mut state = self.state.write().unwrap();
        if *state == EngineState::Paused {
            *state = EngineState::Running;
            info!("Execution engine resumed");
        } else {
            warn!("resume() ignored: engine is {}", *state);
        }
    }

    /// Trip the kill switch: halt all activity, request cancellation of
    /// every in-flight order, drop all pending tasks.
    ///
    /// Never blocks on broker I/O; cancel requests are fired without
    /// waiting for confirmation. Idempotent under concurrent calls.
    pub fn activate_kill_switch(&self, reason: &str) {
        // Single fan-out: only the call that flips the flag cancels.
        if self
            .killed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Kill switch already active, ignoring: {}", reason);
            return;
        }

        error!("KILL SWITCH ACTIVATED: {}", reason);
        *self.state.write().unwrap() = EngineState::KillSwitchActive;

        // Fire-and-forget cancellation of in-flight orders.
        let in_flight: Vec<(Uuid, String, Arc<dyn BrokerPort>, String)> = self
            .active
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(task_id, order)| {
                order
                    .broker_order_id
                    .clone()
                    .map(|id| (*task_id, order.symbol.clone(), Arc::clone(&order.broker), id))
            })
            .collect();

        for (task_id, symbol, broker, order_id) in in_flight {
            tokio::spawn(async move {
                match broker.cancel_order(&order_id).await {
                    Ok(true) => info!(
                        "Cancelled in-flight order {} for {} (task {})",
                        order_id, symbol, task_id
                    ),
                    Ok(false) => warn!("Broker declined cancel for order {}", order_id),
                    Err(e) => error!("Cancel request for order {} failed: {}", order_id, e),
                }
            });
        }

        // Pending tasks are dropped, not executed.
        let dropped = self.queue.lock().unwrap().drain();
        for task in &dropped {
            warn!("Kill switch dropped pending task {}", task.task_id);
        }
        self.stats.lock().unwrap().discarded += dropped.len() as u64;

        self.publish(EventPayload::KillSwitch {
            reason: reason.to_string(),
        });
    }

    /// Clear the kill switch. Returns the engine to `Idle`, not
    /// `Running`: resuming trading after a safety trip requires an
    /// explicit `start()`.
    pub fn deactivate_kill_switch(&self) {
        if self
            .killed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("deactivate_kill_switch() ignored: kill switch not active");
            return;
        }

        *self.state.write().unwrap() = EngineState::Idle;
        info!("Kill switch deactivated; engine is idle until started again");
    }

    // ==================== Submission ====================

    /// Validate and enqueue an order. Synchronous validation plus
    /// enqueue only; no broker I/O happens here.
    pub async fn submit_order(
        &self,
        request: Arc<OrderRequest>,
        broker: Arc<dyn BrokerPort>,
        opts: SubmitOptions,
    ) -> Result<Uuid, SubmitError> {
        // 1. Kill switch
        if self.killed.load(Ordering::SeqCst) {
            return Err(SubmitError::KillSwitchActive);
        }

        // 2. Queue capacity
        {
            let queue = self.queue.lock().unwrap();
            if queue.len() >= queue.capacity() {
                return Err(SubmitError::QueueFull {
                    pending: queue.len(),
                    max: queue.capacity(),
                });
            }
        }

        // 3. Risk gate
        if let Some(gate) = &self.risk_gate {
            let verdict = gate.can_trade().await;
            if !verdict.allowed {
                return Err(SubmitError::RiskRejected {
                    reasons: verdict.reasons,
                });
            }
        }

        // 4. Duplicate filter
        if self.dedup.lock().unwrap().is_duplicate(&request) {
            return Err(SubmitError::Duplicate {
                window_secs: self.config.duplicate_window_secs,
            });
        }

        // 5. Construct and enqueue
        let mut task = ExecutionTask::new(
            Arc::clone(&request),
            broker,
            opts.priority.unwrap_or(self.config.default_priority),
        );
        task.manual_approval = opts
            .manual_approval
            .unwrap_or(self.config.manual_approval_default);
        task.approval = opts.approval;
        task.analysis = opts.analysis;
        task.max_retries = opts.max_retries.unwrap_or(self.config.max_retries);

        let task_id = task.task_id;
        let priority = task.priority;

        self.queue
            .lock()
            .unwrap()
            .enqueue(task)
            .map_err(|full| SubmitError::QueueFull {
                pending: full.pending,
                max: full.max,
            })?;

        self.dedup.lock().unwrap().record(&request);
        self.stats.lock().unwrap().submitted += 1;

        self.publish(EventPayload::OrderCreated {
            task_id,
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            priority,
        });

        debug!(
            "Order accepted: task {} ({} {} {} prio {})",
            task_id, request.side, request.quantity, request.symbol, priority
        );
        Ok(task_id)
    }

    // ==================== Processing loop ====================

    async fn run_loop(self: Arc<Self>) {
        let mut ticker = interval(self.config.poll_interval());

        loop {
            ticker.tick().await;

            let state = *self.state.read().unwrap();
            match state {
                EngineState::Running => {}
                // Idle-wait and re-check; pending tasks are preserved.
                EngineState::Paused | EngineState::KillSwitchActive => continue,
                EngineState::Idle | EngineState::Stopped => break,
            }

            let task = self.queue.lock().unwrap().dequeue();
            let Some(task) = task else { continue };

            self.process_task(task).await;
        }

        info!("Processing loop exited");
    }

    /// Drive one task through approval, broker submission and
    /// retry/terminal handling.
    async fn process_task(&self, mut task: ExecutionTask) {
        let task_id = task.task_id;

        // Expired orders are never executed.
        if task.is_expired(self.config.order_timeout()) {
            warn!(
                "Task {} expired after {:?} in queue, dropping",
                task_id,
                task.age()
            );
            self.stats.lock().unwrap().expired += 1;
            return;
        }

        self.active.lock().unwrap().insert(
            task_id,
            ActiveOrder {
                symbol: task.request.symbol.clone(),
                broker: Arc::clone(&task.broker),
                broker_order_id: None,
            },
        );

        if task.manual_approval && !self.approval_step(&task).await {
            debug!("Task {} not approved, dropping silently", task_id);
            self.stats.lock().unwrap().disapproved += 1;
            self.active.lock().unwrap().remove(&task_id);
            return;
        }

        // The kill switch may have tripped while waiting for approval.
        if self.killed.load(Ordering::SeqCst) {
            warn!("Task {} dropped: kill switch tripped before submission", task_id);
            self.stats.lock().unwrap().discarded += 1;
            self.active.lock().unwrap().remove(&task_id);
            return;
        }

        match task.broker.place_order(&task.request).await {
            Ok(response) => {
                if let Some(order) = self.active.lock().unwrap().get_mut(&task_id) {
                    order.broker_order_id = Some(response.order_id.clone());
                }

                self.persist_record(&task, &response);

                self.publish(EventPayload::OrderSubmitted {
                    task_id,
                    broker_order_id: response.order_id.clone(),
                    symbol: task.request.symbol.clone(),
                    side: task.request.side,
                    quantity: task.request.quantity,
                    status: response.status,
                    retry_count: task.retry_count,
                });

                if response.has_fill() {
                    let price = response.effective_fill_price(task.request.limit_price);

                    self.publish(EventPayload::OrderFilled {
                        task_id,
                        broker_order_id: response.order_id.clone(),
                        symbol: task.request.symbol.clone(),
                        side: task.request.side,
                        filled_quantity: response.filled_quantity,
                        fill_price: price,
                    });

                    // Directional notification is derived from the side.
                    let payload = match task.request.side {
                        OrderSide::Buy => EventPayload::TradeEntry {
                            task_id,
                            symbol: task.request.symbol.clone(),
                            quantity: response.filled_quantity,
                            price,
                        },
                        OrderSide::Sell => EventPayload::TradeExit {
                            task_id,
                            symbol: task.request.symbol.clone(),
                            quantity: response.filled_quantity,
                            price,
                        },
                    };
                    self.publish(payload);
                }

                self.stats.lock().unwrap().executed += 1;
                self.active.lock().unwrap().remove(&task_id);

                info!(
                    "Task {} executed: order {} {} ({} filled, {} attempts)",
                    task_id,
                    response.order_id,
                    response.status,
                    response.filled_quantity,
                    task.retry_count + 1
                );
            }
            Err(e) => {
                self.active.lock().unwrap().remove(&task_id);

                if e.is_retryable() && task.has_retries_left() {
                    task.retry_count += 1;
                    self.stats.lock().unwrap().retries += 1;

                    let backoff = self.backoff_delay(task.retry_count);
                    warn!(
                        "Task {} broker call failed ({}), retry {}/{} in {:?}",
                        task_id, e, task.retry_count, task.max_retries, backoff
                    );

                    sleep(backoff).await;

                    // A kill switch tripped during backoff empties the
                    // queue; the retry must not re-arm it.
                    if self.killed.load(Ordering::SeqCst) {
                        warn!("Task {} dropped: kill switch tripped during backoff", task_id);
                        self.stats.lock().unwrap().discarded += 1;
                        return;
                    }

                    // Re-enter at the original priority with a fresh
                    // sequence number.
                    if let Err(full) = self.queue.lock().unwrap().enqueue(task) {
                        error!(
                            "Could not re-enqueue task {} for retry, queue full ({}/{})",
                            task_id, full.pending, full.max
                        );
                        self.stats.lock().unwrap().failed += 1;
                    }
                } else {
                    error!(
                        "Task {} permanently failed after {} attempts: {}",
                        task_id,
                        task.retry_count + 1,
                        e
                    );
                    self.stats.lock().unwrap().failed += 1;
                }
            }
        }
    }

    /// Approval step: external handler when supplied, otherwise
    /// publish a request and auto-approve after the configured delay.
    async fn approval_step(&self, task: &ExecutionTask) -> bool {
        if let Some(handler) = &task.approval {
            return handler
                .approve(&task.request, task.analysis.as_ref())
                .await;
        }

        self.publish(EventPayload::ApprovalRequested {
            task_id: task.task_id,
            order: (*task.request).clone(),
            analysis: task.analysis.clone(),
        });

        sleep(self.config.approval_delay()).await;
        true
    }

    fn backoff_delay(&self, retry_count: u32) -> Duration {
        let secs = 2u64
            .saturating_pow(retry_count)
            .min(self.config.max_backoff_secs);
        Duration::from_secs(secs)
    }

    /// Write the order record fire-and-forget; persistence failures are
    /// logged, never propagated.
    fn persist_record(&self, task: &ExecutionTask, response: &crate::domain::OrderResponse) {
        let Some(store) = &self.store else { return };

        let record = OrderRecord {
            record_id: Uuid::new_v4(),
            task_id: task.task_id,
            broker_order_id: response.order_id.clone(),
            broker: task.broker.name().to_string(),
            symbol: task.request.symbol.clone(),
            side: task.request.side,
            order_type: task.request.order_type,
            quantity: task.request.quantity,
            limit_price: task.request.limit_price,
            stop_price: task.request.stop_price,
            filled_quantity: response.filled_quantity,
            avg_fill_price: response.avg_fill_price,
            status: response.status,
            strategy: task.request.strategy.clone(),
            analysis: task.analysis.clone(),
            manual_approval: task.manual_approval,
            created_at: task.created_at,
            submitted_at: Utc::now(),
        };

        let store = Arc::clone(store);
        tokio::spawn(async move {
            if let Err(e) = store.record_order(&record).await {
                error!("Failed to persist order record {}: {}", record.record_id, e);
            }
        });
    }

    // ==================== Risk accounting ====================

    /// Record one realized result; trips the kill switch when a
    /// loss/drawdown limit is breached and kill-switch behavior is
    /// enabled.
    pub fn update_metrics(&self, pnl: Decimal, equity: Decimal) {
        if let Some(breach) = self.risk.update(pnl, equity) {
            if self.config.kill_switch_enabled {
                self.activate_kill_switch(&format!("Risk limit breached: {}", breach));
            } else {
                warn!("Risk limit breached (kill switch disabled): {}", breach);
            }
        }
    }

    // ==================== Queries ====================

    pub fn state(&self) -> EngineState {
        *self.state.read().unwrap()
    }

    pub fn is_kill_switch_active(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    pub fn stats(&self) -> EngineStats {
        *self.stats.lock().unwrap()
    }

    pub fn risk_snapshot(&self) -> RiskSnapshot {
        self.risk.snapshot()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn publish(&self, payload: EventPayload) {
        self.bus.publish(Event::new(SOURCE, payload));
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.loop_handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::PaperBroker;
    use crate::error::BrokerError;
    use rust_decimal_macros::dec;

    fn test_config() -> EngineConfig {
        EngineConfig {
            poll_interval_ms: 10,
            approval_delay_secs: 0,
            ..Default::default()
        }
    }

    fn make_engine(config: EngineConfig) -> Arc<ExecutionEngine> {
        Arc::new(ExecutionEngine::new(config, Arc::new(EventBus::default())))
    }

    fn buy_request(symbol: &str, qty: Decimal) -> Arc<OrderRequest> {
        Arc::new(OrderRequest::limit(symbol, OrderSide::Buy, qty, dec!(100)))
    }

    #[tokio::test]
    async fn test_submit_rejects_when_kill_switch_active() {
        let engine = make_engine(test_config());
        engine.activate_kill_switch("test");

        let result = engine
            .submit_order(
                buy_request("BTCUSDT", dec!(1)),
                Arc::new(PaperBroker::new("paper")),
                SubmitOptions::default(),
            )
            .await;
        assert_eq!(result.unwrap_err(), SubmitError::KillSwitchActive);
    }

    #[tokio::test]
    async fn test_submit_rejects_duplicates() {
        let engine = make_engine(test_config());
        let broker: Arc<PaperBroker> = Arc::new(PaperBroker::new("paper"));

        let first = engine
            .submit_order(
                buy_request("SYM", dec!(10)),
                broker.clone(),
                SubmitOptions::default().with_priority(5),
            )
            .await;
        assert!(first.is_ok());

        let second = engine
            .submit_order(
                buy_request("SYM", dec!(10)),
                broker,
                SubmitOptions::default().with_priority(5),
            )
            .await;
        assert_eq!(
            second.unwrap_err(),
            SubmitError::Duplicate { window_secs: 5 }
        );
    }

    #[tokio::test]
    async fn test_submit_rejects_when_queue_full() {
        let config = EngineConfig {
            max_pending_orders: 1,
            ..test_config()
        };
        let engine = make_engine(config);
        let broker: Arc<PaperBroker> = Arc::new(PaperBroker::new("paper"));

        engine
            .submit_order(
                buy_request("AAA", dec!(1)),
                broker.clone(),
                SubmitOptions::default(),
            )
            .await
            .unwrap();

        let result = engine
            .submit_order(buy_request("BBB", dec!(2)), broker, SubmitOptions::default())
            .await;
        assert_eq!(
            result.unwrap_err(),
            SubmitError::QueueFull { pending: 1, max: 1 }
        );
    }

    #[tokio::test]
    async fn test_kill_switch_idempotent_under_concurrent_calls() {
        let engine = make_engine(test_config());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.activate_kill_switch("concurrent trip");
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(engine.state(), EngineState::KillSwitchActive);
        assert!(engine.is_kill_switch_active());
    }

    #[tokio::test]
    async fn test_deactivate_returns_to_idle_not_running() {
        let engine = make_engine(test_config());
        engine.clone().start();
        engine.activate_kill_switch("test");
        assert_eq!(engine.state(), EngineState::KillSwitchActive);

        engine.deactivate_kill_switch();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(!engine.is_kill_switch_active());
    }

    #[tokio::test]
    async fn test_loss_limit_trips_kill_switch_once() {
        let config = EngineConfig {
            max_loss_per_day: dec!(100),
            ..test_config()
        };
        let engine = make_engine(config);
        let mut rx = engine.event_bus().subscribe(crate::events::EventKind::KillSwitch);

        engine.update_metrics(dec!(-150), dec!(900));
        assert_eq!(engine.state(), EngineState::KillSwitchActive);

        // Further losses must not re-trip.
        engine.update_metrics(dec!(-50), dec!(850));
        engine.update_metrics(dec!(-50), dec!(800));

        let event = rx.recv().await.unwrap();
        match event.payload {
            EventPayload::KillSwitch { reason } => assert!(reason.contains("loss")),
            other => panic!("unexpected payload: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_backoff_is_exponential_and_capped() {
        let config = EngineConfig {
            max_backoff_secs: 10,
            ..test_config()
        };
        let engine = make_engine(config);

        assert_eq!(engine.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(engine.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(engine.backoff_delay(3), Duration::from_secs(8));
        assert_eq!(engine.backoff_delay(4), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_risk_gate_veto_rejects_submission() {
        use crate::risk::{MockRiskGate, RiskVerdict};

        let mut gate = MockRiskGate::new();
        gate.expect_can_trade()
            .times(1)
            .returning(|| RiskVerdict::deny(vec!["max exposure reached".to_string()]));

        let engine = Arc::new(
            ExecutionEngine::new(test_config(), Arc::new(EventBus::default()))
                .with_risk_gate(Arc::new(gate)),
        );

        let result = engine
            .submit_order(
                buy_request("BTCUSDT", dec!(1)),
                Arc::new(PaperBroker::new("paper")),
                SubmitOptions::default(),
            )
            .await;
        assert_eq!(
            result.unwrap_err(),
            SubmitError::RiskRejected {
                reasons: vec!["max exposure reached".to_string()],
            }
        );
        assert_eq!(engine.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broker_port_called_once_per_task() {
        use crate::broker::MockBrokerPort;
        use crate::domain::{OrderResponse, OrderStatus};

        let mut broker = MockBrokerPort::new();
        broker.expect_name().return_const("mock".to_string());
        broker.expect_place_order().times(1).returning(|request| {
            Ok(OrderResponse {
                order_id: "mock-1".to_string(),
                status: OrderStatus::Filled,
                filled_quantity: request.quantity,
                avg_fill_price: request.limit_price,
            })
        });

        let engine = make_engine(test_config());
        engine
            .submit_order(
                buy_request("BTCUSDT", dec!(1)),
                Arc::new(broker),
                SubmitOptions::default(),
            )
            .await
            .unwrap();
        engine.clone().start();

        for _ in 0..100 {
            if engine.stats().executed == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.stats().executed, 1);
        assert_eq!(engine.active_count(), 0);
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_broker_rejection_fails_without_retry() {
        let engine = make_engine(test_config());
        let broker = Arc::new(PaperBroker::new("paper"));
        broker.fail_next(1, BrokerError::Rejected("insufficient funds".into()));

        engine
            .submit_order(
                buy_request("SYM", dec!(1)),
                broker.clone(),
                SubmitOptions::default(),
            )
            .await
            .unwrap();
        engine.clone().start();

        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = engine.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retries, 0);
        assert_eq!(engine.active_count(), 0);
        assert!(broker.placed_orders().is_empty());
        engine.stop();
    }
}
