//! Capability for asking the user things.
//!
//! The core never touches stdin. Anything interactive goes through an
//! [`InputProvider`]; tests and scripted callers use [`ScriptedInput`].

use crate::{KnitError, Result};
use std::collections::VecDeque;

/// Source of user answers plus an informational channel
pub trait InputProvider {
    /// Ask for free-form text
    fn ask_text(&mut self, prompt: &str) -> Result<String>;

    /// Ask for an integer
    fn ask_int(&mut self, prompt: &str) -> Result<i64>;

    /// Show a non-fatal notice
    fn notify(&mut self, message: &str);
}

/// Replays canned answers in order and records every notice.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
    pub notices: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// No answers at all; any prompt fails
    pub fn silent() -> Self {
        Self::default()
    }

    fn next_answer(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        self.answers.pop_front().ok_or_else(|| {
            KnitError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("no scripted answer for prompt: {prompt}"),
            ))
        })
    }
}

impl InputProvider for ScriptedInput {
    fn ask_text(&mut self, prompt: &str) -> Result<String> {
        self.next_answer(prompt)
    }

    fn ask_int(&mut self, prompt: &str) -> Result<i64> {
        let answer = self.next_answer(prompt)?;
        answer
            .trim()
            .parse()
            .map_err(|_| KnitError::InvalidValue(format!("'{answer}' is not an integer")))
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}
