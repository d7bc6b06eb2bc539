//! The inference capability behind the backend server.
//!
//! The relay treats the model as a black box: a prompt goes in, text
//! and a few generation statistics come out. Implementations of
//! [`Generate`] own model loading and warm-up; nothing outside this
//! module knows what produces the text.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use studbot_common::Result;

/// Sampling parameters forwarded to the engine with every prompt.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Stop sequence terminating generation.
    pub stop: Option<String>,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.35,
            top_p: 0.15,
            stop: Some("###".into()),
        }
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A stop sequence was produced.
    Stop,
    /// The token budget ran out.
    Length,
}

/// One completed generation run.
#[derive(Debug, Clone)]
pub struct Generated {
    /// The generated text. May be empty.
    pub text: String,
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens produced in the reply.
    pub completion_tokens: u32,
    /// Wall-clock duration of the run.
    pub generation_time: Duration,
    /// Why generation stopped, when the engine reports it.
    pub stop_reason: Option<StopReason>,
}

impl Generated {
    /// Total tokens across prompt and completion.
    pub const fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Capability interface for an inference engine.
#[async_trait]
pub trait Generate: Send + Sync {
    /// Run one generation over the given prompt.
    async fn generate(&self, prompt: &str, params: &GenerateParams) -> Result<Generated>;
}

// ============================================================================
// EchoEngine
// ============================================================================

/// Echoes the question back; development stand-in for a real model.
pub struct EchoEngine;

#[async_trait]
impl Generate for EchoEngine {
    async fn generate(&self, prompt: &str, _params: &GenerateParams) -> Result<Generated> {
        let started = Instant::now();
        let text = format!("You asked: {}", last_question(prompt));

        Ok(Generated {
            prompt_tokens: word_count(prompt),
            completion_tokens: word_count(&text),
            text,
            generation_time: started.elapsed(),
            stop_reason: Some(StopReason::Stop),
        })
    }
}

/// Extract the final `###Question:` line from a composed prompt, or the
/// whole prompt when the template marker is absent.
fn last_question(prompt: &str) -> &str {
    prompt
        .rfind("###Question: ")
        .map(|pos| {
            let tail = &prompt[pos + "###Question: ".len()..];
            tail.lines().next().unwrap_or(tail)
        })
        .unwrap_or(prompt)
}

fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

// ============================================================================
// ScriptedEngine
// ============================================================================

/// Replies with a fixed sequence of canned texts; used in tests.
///
/// Once the script is exhausted every further call yields an empty
/// reply, which downstream turns into the no-answer marker.
pub struct ScriptedEngine {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedEngine {
    /// Create an engine that plays back the given replies in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl Generate for ScriptedEngine {
    async fn generate(&self, prompt: &str, _params: &GenerateParams) -> Result<Generated> {
        let started = Instant::now();
        let text = self
            .replies
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_default();

        Ok(Generated {
            prompt_tokens: word_count(prompt),
            completion_tokens: word_count(&text),
            text,
            generation_time: started.elapsed(),
            stop_reason: Some(StopReason::Stop),
        })
    }
}
