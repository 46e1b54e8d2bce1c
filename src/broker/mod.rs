//! Broker port consumed by the execution engine.
//!
//! The engine never talks to a venue directly; every task carries a
//! handle to the broker it must use, so multiple brokers can be
//! configured concurrently.

pub mod paper;

use async_trait::async_trait;

use crate::domain::{OrderRequest, OrderResponse};
use crate::error::BrokerError;

pub use paper::PaperBroker;

/// Capability exposed by a broker connection.
///
/// Implementations may fail or be slow; the engine recovers transient
/// failures with bounded exponential backoff.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerPort: Send + Sync {
    /// Human-readable broker name for logs and persisted records.
    fn name(&self) -> &str;

    /// Place an order with the broker.
    async fn place_order(
        &self,
        request: &OrderRequest,
    ) -> std::result::Result<OrderResponse, BrokerError>;

    /// Request cancellation of a previously placed order.
    ///
    /// Returns whether the broker accepted the cancel request.
    async fn cancel_order(&self, order_id: &str) -> std::result::Result<bool, BrokerError>;
}
