//! Common types shared across the Bitte relay crates.
//!
//! This crate holds the data model every component agrees on: agent
//! descriptors, conversation turns, job tracking and the error type.

pub mod agent;
pub mod error;
pub mod job;
pub mod message;

pub use agent::{AgentDescriptor, AgentNetwork};
pub use error::{BitteError, Result};
pub use job::{FailureKind, JobHandle, JobResult, JobStatus};
pub use message::{ChatTurn, MessageRole, trailing_window};
