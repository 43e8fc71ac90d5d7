//! Pipeline execution engine

pub mod engine;
pub mod events;
pub mod executor;
pub mod scheduler;

pub use engine::{EngineError, ExecutionEngine};
pub use events::{EventHandler, EventSink, ExecutionEvent};
pub use executor::EntryExecutor;
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
