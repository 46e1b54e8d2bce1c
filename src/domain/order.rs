use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Stop => write!(f, "STOP"),
            OrderType::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Order created but not yet submitted
    Pending,
    /// Order submitted to the broker
    Submitted,
    /// Order partially filled
    PartiallyFilled,
    /// Order fully filled
    Filled,
    /// Order cancelled
    Cancelled,
    /// Order rejected by the broker
    Rejected,
    /// Order expired before execution
    Expired,
    /// Order failed (internal error)
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::Failed
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Submitted | OrderStatus::PartiallyFilled
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Submitted => write!(f, "SUBMITTED"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
            OrderStatus::Expired => write!(f, "EXPIRED"),
            OrderStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Order request (what the caller wants to do)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    /// Name of the strategy that originated this order
    pub strategy: Option<String>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
            stop_price: None,
            strategy: None,
        }
    }

    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Limit,
            limit_price: Some(price),
            stop_price: None,
            strategy: None,
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_stop_price(mut self, price: Decimal) -> Self {
        self.stop_price = Some(price);
        self
    }

    /// Notional value of the request (quantity * limit price, when priced)
    pub fn notional(&self) -> Option<Decimal> {
        self.limit_price.map(|p| p * self.quantity)
    }
}

/// Broker response to a placed order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    /// Broker-assigned order id
    pub order_id: String,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Option<Decimal>,
}

impl OrderResponse {
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    pub fn has_fill(&self) -> bool {
        self.filled_quantity > Decimal::ZERO
    }

    /// Average fill price, falling back to the request's limit price.
    pub fn effective_fill_price(&self, fallback: Option<Decimal>) -> Option<Decimal> {
        self.avg_fill_price.or(fallback)
    }
}

/// Persisted order record (written fire-and-forget after submission)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub record_id: Uuid,
    pub task_id: Uuid,
    pub broker_order_id: String,
    pub broker: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub status: OrderStatus,
    pub strategy: Option<String>,
    /// Advisory-analysis snapshot, opaque to the engine
    pub analysis: Option<serde_json::Value>,
    pub manual_approval: bool,
    pub created_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_status_predicates() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Submitted.is_terminal());

        assert!(OrderStatus::PartiallyFilled.is_active());
        assert!(!OrderStatus::Cancelled.is_active());
    }

    #[test]
    fn test_limit_request_notional() {
        let request = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(2), dec!(45000));
        assert_eq!(request.notional(), Some(dec!(90000)));

        let market = OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(1));
        assert_eq!(market.notional(), None);
    }

    #[test]
    fn test_effective_fill_price_fallback() {
        let response = OrderResponse {
            order_id: "b-1".to_string(),
            status: OrderStatus::Filled,
            filled_quantity: dec!(10),
            avg_fill_price: None,
        };
        assert_eq!(
            response.effective_fill_price(Some(dec!(0.5))),
            Some(dec!(0.5))
        );

        let response = OrderResponse {
            avg_fill_price: Some(dec!(0.48)),
            ..response
        };
        assert_eq!(
            response.effective_fill_price(Some(dec!(0.5))),
            Some(dec!(0.48))
        );
    }
}
