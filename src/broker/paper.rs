//! Paper broker - simulated execution for tests and paper trading.
//!
//! Fills orders immediately and completely at the limit price (or a
//! configurable mark price for market orders). Failures can be scripted
//! to exercise the engine's retry path.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{OrderRequest, OrderResponse, OrderStatus};
use crate::error::BrokerError;

use super::BrokerPort;

pub struct PaperBroker {
    name: String,
    /// Fill price used when the request carries no limit price
    mark_price: Mutex<Decimal>,
    /// Scripted failures, consumed one per place_order call
    fail_queue: Mutex<VecDeque<BrokerError>>,
    placed: Mutex<Vec<(String, OrderRequest)>>,
    cancelled: Mutex<Vec<String>>,
}

impl PaperBroker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mark_price: Mutex::new(Decimal::ONE),
            fail_queue: Mutex::new(VecDeque::new()),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mark_price(&self, price: Decimal) {
        *self.mark_price.lock().unwrap() = price;
    }

    /// Script the next `count` place_order calls to fail with `error`.
    pub fn fail_next(&self, count: usize, error: BrokerError) {
        let mut queue = self.fail_queue.lock().unwrap();
        for _ in 0..count {
            queue.push_back(error.clone());
        }
    }

    /// Orders accepted so far, in submission order.
    pub fn placed_orders(&self) -> Vec<(String, OrderRequest)> {
        self.placed.lock().unwrap().clone()
    }

    /// Order ids for which cancellation was requested.
    pub fn cancelled_orders(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerPort for PaperBroker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn place_order(
        &self,
        request: &OrderRequest,
    ) -> std::result::Result<OrderResponse, BrokerError> {
        if let Some(error) = self.fail_queue.lock().unwrap().pop_front() {
            return Err(error);
        }

        let order_id = format!("paper-{}", Uuid::new_v4());
        let fill_price = request
            .limit_price
            .unwrap_or_else(|| *self.mark_price.lock().unwrap());

        self.placed
            .lock()
            .unwrap()
            .push((order_id.clone(), request.clone()));

        Ok(OrderResponse {
            order_id,
            status: OrderStatus::Filled,
            filled_quantity: request.quantity,
            avg_fill_price: Some(fill_price),
        })
    }

    async fn cancel_order(&self, order_id: &str) -> std::result::Result<bool, BrokerError> {
        self.cancelled.lock().unwrap().push(order_id.to_string());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_paper_fill_at_limit_price() {
        let broker = PaperBroker::new("paper");
        let request = OrderRequest::limit("SOLUSDT", OrderSide::Buy, dec!(3), dec!(150));

        let response = broker.place_order(&request).await.unwrap();
        assert!(response.is_filled());
        assert_eq!(response.filled_quantity, dec!(3));
        assert_eq!(response.avg_fill_price, Some(dec!(150)));
        assert_eq!(broker.placed_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_market_order_fills_at_mark() {
        let broker = PaperBroker::new("paper");
        broker.set_mark_price(dec!(149.5));
        let request = OrderRequest::market("SOLUSDT", OrderSide::Sell, dec!(2));

        let response = broker.place_order(&request).await.unwrap();
        assert_eq!(response.avg_fill_price, Some(dec!(149.5)));
    }

    #[tokio::test]
    async fn test_scripted_failures_then_success() {
        let broker = PaperBroker::new("paper");
        broker.fail_next(2, BrokerError::Network("connection reset".into()));
        let request = OrderRequest::limit("SOLUSDT", OrderSide::Buy, dec!(1), dec!(150));

        tokio_test::assert_err!(broker.place_order(&request).await);
        tokio_test::assert_err!(broker.place_order(&request).await);
        tokio_test::assert_ok!(broker.place_order(&request).await);
    }

    #[tokio::test]
    async fn test_cancel_recorded() {
        let broker = PaperBroker::new("paper");
        assert!(broker.cancel_order("paper-123").await.unwrap());
        assert_eq!(broker.cancelled_orders(), vec!["paper-123".to_string()]);
    }
}
