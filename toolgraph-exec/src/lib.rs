#![deny(missing_docs)]
//! Execution history, the argument evaluator, node executors, and the
//! scheduler/controller that together run one tool invocation (spec
//! §4.B, §4.C, §4.D, §4.G).

pub mod argument;
pub mod controller;
pub mod executors;
pub mod history;
pub mod hooks;
pub mod scheduler;
pub mod telemetry;

pub use controller::{Controller, ControllerStatus, InvalidTransition};
pub use executors::ExecutorOutput;
pub use history::{ExecutionHistory, HistoryRecord};
pub use hooks::{NoopHooks, SchedulerHooks};
pub use scheduler::{run, ExecutionFailure, ExecutionOutcome};
pub use telemetry::{NodeTypeTelemetry, Telemetry};
