//! The ReAct reasoning loop
//!
//! Each step sends the system prompt, the windowed conversation and the
//! question with the scratchpad so far, then parses the completion:
//! an action is run and its observation recorded, a final answer ends the
//! loop, and malformed output becomes a corrective observation. The loop
//! always ends within `max_iterations` steps.

use dbbot_db::Dialect;
use dbbot_provider::{apply_stop, ChatParams, Message, Provider, Usage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::parser::{self, Decision};
use crate::prompt::{question_message, PromptTemplate};
use crate::scratchpad::{Scratchpad, Step};
use crate::tools::ToolRegistry;
use crate::Result;

/// Stop generating before the model invents its own observation
pub const STOP_SEQUENCE: &str = "\nObservation:";

/// Answer given when the step cap is reached
pub const STEP_LIMIT_ANSWER: &str = "I was unable to determine an answer within the step limit.";

/// Action name recorded for malformed completions
const PARSE_ERROR_ACTION: &str = "_Exception";

/// Bounds of one agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPolicy {
    pub max_iterations: u32,
    /// Pause before re-thinking after a malformed completion
    pub parse_retry_backoff: Duration,
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            parse_retry_backoff: Duration::ZERO,
        }
    }
}

/// One question for the agent
#[derive(Debug, Clone)]
pub struct AgentInput {
    pub input: String,
    pub dialect: Dialect,
    pub top_k: usize,
}

/// Progress reported while the agent works
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    Action {
        step: u32,
        thought: String,
        tool: String,
        input: String,
    },
    Observation {
        step: u32,
        tool: String,
        text: String,
    },
    ParseError {
        step: u32,
        observation: String,
    },
    Finish {
        step: u32,
        answer: String,
    },
    StepLimit {
        steps: u32,
    },
}

/// Receives intermediate steps, e.g. to stream them to the terminal
pub trait StepObserver: Send + Sync {
    fn on_step(&self, event: &StepEvent);
}

impl<F> StepObserver for F
where
    F: Fn(&StepEvent) + Send + Sync,
{
    fn on_step(&self, event: &StepEvent) {
        self(event)
    }
}

/// Ignores every step
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_step(&self, _event: &StepEvent) {}
}

/// Text before the `Action:` line, used as the visible thought
fn thought_of(log: &str) -> String {
    let end = log.find("Action").unwrap_or(log.len());
    log[..end]
        .trim()
        .trim_start_matches("Thought:")
        .trim()
        .to_string()
}

/// ReAct agent over a provider and a tool registry
pub struct ReActAgent<P: Provider> {
    provider: Arc<P>,
    tools: ToolRegistry,
    prompt: PromptTemplate,
    model: String,
    max_tokens: u32,
    temperature: f32,
    policy: LoopPolicy,
}

impl<P: Provider> ReActAgent<P> {
    pub fn new(provider: P, tools: ToolRegistry) -> Self {
        let model = provider.default_model();
        Self {
            provider: Arc::new(provider),
            tools,
            prompt: PromptTemplate::default(),
            model,
            max_tokens: 2048,
            temperature: 0.0,
            policy: LoopPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LoopPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer one question. Only provider failures are errors; everything
    /// else ends in an answer, the step-limit answer at worst.
    pub async fn run(
        &self,
        input: &AgentInput,
        history: &[Message],
        observer: &dyn StepObserver,
    ) -> Result<String> {
        let system = self.prompt.render(input.dialect, input.top_k, &self.tools);
        let stop = vec![STOP_SEQUENCE.to_string()];
        let mut scratchpad = Scratchpad::default();
        let mut usage = Usage::default();

        info!(
            "answering question against {} (up to {} steps)",
            input.dialect, self.policy.max_iterations
        );

        for step in 1..=self.policy.max_iterations {
            let mut messages = Vec::with_capacity(history.len() + 2);
            messages.push(Message::system(system.clone()));
            messages.extend_from_slice(history);
            messages.push(Message::user(question_message(
                &input.input,
                &scratchpad.render(),
            )));

            let params = ChatParams {
                model: self.model.clone(),
                messages,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                stop: stop.clone(),
            };

            debug!("step {}: thinking", step);
            trace!("prompt:\n{}", params.transcript());
            let response = self.provider.chat(params).await?;
            usage.add(&response.usage);
            let text = apply_stop(&response.content, &stop);

            match parser::parse(&text) {
                Ok(Decision::Finish { answer }) => {
                    info!(
                        "final answer after {} steps ({} tokens)",
                        step, usage.total_tokens
                    );
                    observer.on_step(&StepEvent::Finish {
                        step,
                        answer: answer.clone(),
                    });
                    return Ok(answer);
                }
                Ok(Decision::Action { tool, input: tool_input }) => {
                    debug!("step {}: {} <- {:?}", step, tool, tool_input);
                    observer.on_step(&StepEvent::Action {
                        step,
                        thought: thought_of(&text),
                        tool: tool.clone(),
                        input: tool_input.clone(),
                    });

                    let observation = self.tools.invoke_by_name(&tool, &tool_input).await;
                    observer.on_step(&StepEvent::Observation {
                        step,
                        tool: tool.clone(),
                        text: observation.clone(),
                    });

                    scratchpad.push(Step {
                        log: text,
                        action: tool,
                        action_input: tool_input,
                        observation,
                    });
                }
                Err(e) => {
                    warn!("step {}: unparsable completion: {}", step, e);
                    let observation = e.observation().to_string();
                    observer.on_step(&StepEvent::ParseError {
                        step,
                        observation: observation.clone(),
                    });

                    scratchpad.push(Step {
                        log: text,
                        action: PARSE_ERROR_ACTION.to_string(),
                        action_input: observation.clone(),
                        observation,
                    });

                    if !self.policy.parse_retry_backoff.is_zero() {
                        tokio::time::sleep(self.policy.parse_retry_backoff).await;
                    }
                }
            }
        }

        warn!(
            "no final answer within {} steps ({} tokens)",
            self.policy.max_iterations, usage.total_tokens
        );
        observer.on_step(&StepEvent::StepLimit {
            steps: self.policy.max_iterations,
        });
        Ok(STEP_LIMIT_ANSWER.to_string())
    }
}
