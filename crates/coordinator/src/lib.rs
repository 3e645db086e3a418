//! Agent relay coordinator for Telegram-Bitte.
//!
//! The coordinator turns one chat request into one reply:
//! 1. Lists agents from the Masumi and Shade registries (or the built-in fallbacks)
//! 2. Picks an agent by ordered keyword rules
//! 3. Runs the agent's job protocol to completion, failure or timeout
//! 4. Composes the reply, answering failures with the configured fallback
//!
//! # Architecture
//!
//! ```text
//! ChatRequest
//!      │
//!      ▼
//! ┌─────────────────┐      ┌──────────────────┐
//! │   Coordinator   │ ───► │  AgentDirectory  │ ──► registries
//! │   (this crate)  │      └──────────────────┘
//! └────────┬────────┘
//!          │ AgentSelector
//!          ▼
//! ┌─────────────────┐   availability → input_schema → start_job → status × N
//! │ JobOrchestrator │ ─────────────────────────────────────────────► agent
//! └────────┬────────┘
//!          │ JobResult
//!          ▼
//! ┌─────────────────┐
//! │ResponseComposer │ ──► ComposedReply {response, agent, network}
//! └─────────────────┘
//! ```

pub mod composer;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod orchestrator;
pub mod protocol;
pub mod selector;

pub use composer::{ComposedReply, ResponseComposer};
pub use config::{CoordinatorConfig, FallbackStrategy, SchemaPolicy};
pub use coordinator::{ChatRequest, Coordinator};
pub use directory::AgentDirectory;
pub use orchestrator::JobOrchestrator;
pub use protocol::{AdapterSet, AgentProtocolAdapter, HttpJobAdapter, InputField};
pub use selector::{AgentSelector, SelectionReason};
