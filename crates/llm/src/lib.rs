pub mod client;
pub mod openai;

pub use client::{ChatBackend, ChatMessage, ChatReply, Role};
pub use openai::OpenAiCompatibleBackend;
