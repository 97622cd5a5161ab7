//! 核心层：阶段状态机、流程监管、紧急计数器、错误类型

pub mod coordinator;
pub mod error;
pub mod state;
pub mod supervisor;
pub mod ticker;

pub use coordinator::{
    SystemCoordinator, DECISION_TARGET, DEFAULT_INTENT, EMERGENCY_INTENT, SAFETY_STATEMENT,
};
pub use error::CoordinatorError;
pub use state::{
    AdaptationExplanation, Hurdle, HurdleCommand, LogBuffer, LogEntry, Phase, SystemEvent,
    SystemSnapshot, LOG_CAPACITY, RECEIVERS_CAP, RECEIVERS_FLOOR,
};
pub use supervisor::{FlowKind, FlowSupervisor, FlowTicket};
