//! ReAct completion parser
//!
//! Reads one model completion and decides whether it names a tool call
//! (`Action:` / `Action Input:`) or finishes (`Final Answer:`).

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// What the model decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Action { tool: String, input: String },
    Finish { answer: String },
}

/// Completion that does not follow the grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing 'Action:' after 'Thought:'")]
    MissingAction,

    #[error("missing 'Action Input:' after 'Action:'")]
    MissingActionInput,

    #[error("completion has both a final answer and an action")]
    FinalAnswerAndAction,

    #[error("could not parse completion")]
    Unparsable,
}

impl ParseError {
    /// Text fed back to the model so it can correct itself
    pub fn observation(&self) -> &'static str {
        match self {
            ParseError::MissingAction => "Invalid Format: Missing 'Action:' after 'Thought:'",
            ParseError::MissingActionInput => {
                "Invalid Format: Missing 'Action Input:' after 'Action:'"
            }
            ParseError::FinalAnswerAndAction | ParseError::Unparsable => {
                "Invalid or incomplete response"
            }
        }
    }
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
            .expect("valid regex")
    })
}

fn action_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action\s*\d*\s*:").expect("valid regex"))
}

fn action_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action\s*\d*\s*Input\s*\d*\s*:").expect("valid regex"))
}

pub fn parse(text: &str) -> Result<Decision, ParseError> {
    let has_final_answer = text.contains(FINAL_ANSWER_MARKER);

    if let Some(caps) = action_re().captures(text) {
        if has_final_answer {
            return Err(ParseError::FinalAnswerAndAction);
        }
        let tool = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
        let input = caps
            .get(2)
            .map_or("", |m| m.as_str())
            .trim()
            .trim_matches('"')
            .to_string();
        return Ok(Decision::Action { tool, input });
    }

    if has_final_answer {
        let answer = text
            .rsplit(FINAL_ANSWER_MARKER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        return Ok(Decision::Finish { answer });
    }

    if !action_only_re().is_match(text) {
        Err(ParseError::MissingAction)
    } else if !action_input_re().is_match(text) {
        Err(ParseError::MissingActionInput)
    } else {
        Err(ParseError::Unparsable)
    }
}
