//! Shared fakes for the Generator and Verifier ports.
//!
//! Each integration test binary compiles this module independently, so
//! not every fake is used everywhere.
#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;

use promptly::{EngineResult, Generator, VerificationResult, Verifier};

/// Generator whose answer encodes the prompt length, so verifiers can
/// grade deterministically on how detailed the prompt was.
pub struct EchoLenGenerator;

#[async_trait]
impl Generator for EchoLenGenerator {
    async fn generate(&self, prompt: &str) -> EngineResult<String> {
        Ok(format!("echo:{}", prompt.len()))
    }
}

/// Generator that records every prompt it receives and replies from a
/// fixed script (last entry repeats).
pub struct ScriptedGenerator {
    pub prompts: Mutex<Vec<String>>,
    answers: Vec<String>,
}

impl ScriptedGenerator {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            answers: answers.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> EngineResult<String> {
        let mut prompts = self.prompts.lock().unwrap();
        let index = prompts.len().min(self.answers.len() - 1);
        prompts.push(prompt.to_string());
        Ok(self.answers[index].clone())
    }
}

/// Verifier that replays a fixed script of verdicts (last entry repeats).
pub struct ScriptedVerifier {
    cursor: Mutex<usize>,
    script: Vec<VerificationResult>,
}

impl ScriptedVerifier {
    pub fn new(script: Vec<VerificationResult>) -> Self {
        Self {
            cursor: Mutex::new(0),
            script,
        }
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn verify(
        &self,
        _task: &str,
        _answer: &str,
        _context: Option<&str>,
        _ground_truth: Option<&serde_json::Value>,
    ) -> EngineResult<VerificationResult> {
        let mut cursor = self.cursor.lock().unwrap();
        let index = (*cursor).min(self.script.len() - 1);
        *cursor += 1;
        Ok(self.script[index].clone())
    }
}

/// Verifier that grades `echo:<len>` answers by prompt length: longer
/// prompts earn higher confidence, capped below 1.0. Flags answers as
/// incomplete so the mutation path always has feedback to read.
pub struct PromptLengthVerifier;

#[async_trait]
impl Verifier for PromptLengthVerifier {
    async fn verify(
        &self,
        _task: &str,
        answer: &str,
        _context: Option<&str>,
        _ground_truth: Option<&serde_json::Value>,
    ) -> EngineResult<VerificationResult> {
        let prompt_len: f64 = answer
            .strip_prefix("echo:")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);
        let confidence = (0.3 + prompt_len / 500.0).min(0.95);
        Ok(VerificationResult::new(confidence > 0.5, confidence)
            .with_error("the answer is incomplete and missing supporting detail"))
    }
}
