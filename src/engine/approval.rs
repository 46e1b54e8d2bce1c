//! Human-in-the-loop approval seam.
//!
//! The engine does not implement approval policy. Deployments supply an
//! `ApprovalHandler` (wired to a UI confirmation or an external policy
//! service); tasks without one fall back to the engine's own path:
//! publish an approval-requested notification, wait a fixed delay, then
//! auto-approve.

use async_trait::async_trait;

use crate::domain::OrderRequest;

/// Capability invoked to obtain approval before submission.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Decide whether the order may be submitted. The advisory analysis
    /// attached to the task is passed through uninterpreted.
    async fn approve(&self, request: &OrderRequest, analysis: Option<&serde_json::Value>) -> bool;
}

/// Handler that always returns a fixed decision.
pub struct StaticApproval(pub bool);

#[async_trait]
impl ApprovalHandler for StaticApproval {
    async fn approve(&self, _request: &OrderRequest, _analysis: Option<&serde_json::Value>) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_static_approval() {
        let request = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(1));
        assert!(StaticApproval(true).approve(&request, None).await);
        assert!(!StaticApproval(false).approve(&request, None).await);
    }
}
