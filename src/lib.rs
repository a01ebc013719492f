#![doc = include_str!("../README.md")]
#![no_std]
#![deny(clippy::mod_module_files)]

extern crate alloc;

pub mod builders;
pub mod config;
pub mod emitter;
pub mod errors;
pub mod flush;
pub mod graph;
pub mod queue;
pub mod scheduler;
pub mod schema;
#[cfg(feature = "testing")]
pub mod testing;
pub mod value;

// Re-export main types
pub use builders::{ActionKind, Delete, Insert, Operation, PendingAction, Update};
pub use config::BatchConfig;
pub use emitter::{EmitReport, StatementExecutor, emit};
pub use flush::{FlushCycle, FlushState};
pub use graph::{DependencyEdge, DependencyGraph};
pub use queue::ActionQueue;
pub use scheduler::{BatchGroup, ExecutionPlan, schedule};
pub use schema::EntityMapping;
pub use value::{ActionId, Value};

// Re-export errors
pub use errors::{Error, ExecutorError};
