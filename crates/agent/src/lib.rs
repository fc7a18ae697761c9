//! Database question-answering agent
//!
//! A ReAct loop over a fixed tool set: the model alternates between a
//! thought, a tool call and the tool's observation until it produces a
//! final answer or runs out of steps.

use thiserror::Error;

pub mod parser;
pub mod prompt;
pub mod react;
pub mod scratchpad;
pub mod tools;
pub mod turn;

pub use prompt::PromptTemplate;
pub use react::{AgentInput, LoopPolicy, NoopObserver, ReActAgent, StepEvent, StepObserver};
pub use tools::{CodeSandbox, SqlToolSettings, Tool, ToolError, ToolId, ToolRegistry};
pub use turn::SessionLoop;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("language model error: {0}")]
    Provider(#[from] dbbot_provider::ProviderError),

    #[error("invalid tool registry: {0}")]
    Registry(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
