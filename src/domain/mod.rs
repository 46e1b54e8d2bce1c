pub mod order;
pub mod state;
pub mod task;

pub use order::{OrderRecord, OrderRequest, OrderResponse, OrderSide, OrderStatus, OrderType};
pub use state::EngineState;
pub use task::ExecutionTask;
