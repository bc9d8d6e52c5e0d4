//! Playbook subsystem: the immutable model (C6), the action handler
//! registry (C8), and the state-machine executor (C7).

pub mod executor;
pub mod model;
pub mod registry;

pub use executor::ExecutionId;
pub use executor::ExecutionState;
pub use executor::HistoryFilter;
pub use executor::PlaybookExecution;
pub use executor::PlaybookExecutor;
pub use model::Action;
pub use model::Playbook;
pub use registry::ActionContext;
pub use registry::ActionHandler;
pub use registry::ActionHandlerRegistry;
pub use registry::ActionResult;
pub use registry::ActionStatus;
