pub mod broker;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod persistence;
pub mod risk;
pub mod telemetry;

pub use broker::{BrokerPort, PaperBroker};
pub use config::{AppConfig, DatabaseConfig, EngineConfig, LoggingConfig};
pub use domain::{
    EngineState, ExecutionTask, OrderRecord, OrderRequest, OrderResponse, OrderSide, OrderStatus,
    OrderType,
};
pub use engine::approval::{ApprovalHandler, StaticApproval};
pub use engine::{EngineStats, ExecutionEngine, SubmitOptions};
pub use error::{BrokerError, Result, SubmitError, TillerError};
pub use events::{Event, EventBus, EventKind, EventPayload, Severity};
pub use persistence::{MemoryOrderStore, OrderStore, PostgresOrderStore};
pub use risk::{LimitBreach, RiskGate, RiskSnapshot, RiskTracker, RiskVerdict};
