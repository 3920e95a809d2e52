//! Parser engine: background job scheduler and the connection the UI talks to.
mod connection;
mod engine;
mod error;
mod queue;
mod scheduler;
mod scripted;
mod sink;
mod types;

pub use connection::{ParserConnection, TryAWordHandle};
pub use engine::ParseEngine;
pub use error::{ConnectionError, EngineFault, SchedulerError};
pub use queue::Enqueued;
pub use scheduler::{ParserScheduler, SchedulerSettings};
pub use scripted::{Gate, Journal, ScriptedEngine};
pub use sink::{ChannelSink, SchedulerSink, SinkId};
pub use types::{SchedulerEvent, TraceRequest, WordformUpdate};
