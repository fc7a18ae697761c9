//! One conversation driving the agent, a turn at a time

use dbbot_db::Dialect;
use dbbot_provider::Provider;
use dbbot_session::{Session, DEFAULT_HISTORY_WINDOW};
use tracing::{error, info};

use crate::react::{AgentInput, ReActAgent, StepObserver};

/// Conversation history plus the agent that answers in it
pub struct SessionLoop<P: Provider> {
    agent: ReActAgent<P>,
    session: Session,
    dialect: Dialect,
    top_k: usize,
    max_history_messages: usize,
}

impl<P: Provider> SessionLoop<P> {
    pub fn new(agent: ReActAgent<P>, dialect: Dialect, top_k: usize) -> Self {
        Self {
            agent,
            session: Session::default(),
            dialect,
            top_k,
            max_history_messages: DEFAULT_HISTORY_WINDOW,
        }
    }

    /// Number of recent turns the model sees
    pub fn with_history_window(mut self, max_history_messages: usize) -> Self {
        self.max_history_messages = max_history_messages;
        self
    }

    /// Record the user's message, let the agent answer it, record the answer
    pub async fn on_user_message(&mut self, text: &str, observer: &dyn StepObserver) -> String {
        info!("new user message ({} chars)", text.len());
        self.session.push_user(text);

        let history = self.session.history_before_last(self.max_history_messages);
        let input = AgentInput {
            input: text.to_string(),
            dialect: self.dialect,
            top_k: self.top_k,
        };

        let answer = match self.agent.run(&input, &history, observer).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("agent failed: {}", e);
                format!("Error: {}", e)
            }
        };

        self.session.push_assistant(answer.clone());
        answer
    }

    /// Back to a single greeting
    pub fn reset(&mut self) {
        self.session.reset();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn agent(&self) -> &ReActAgent<P> {
        &self.agent
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}
