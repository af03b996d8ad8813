#![allow(dead_code)]
use super::{CompletionClient, CompletionError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Completions are consumed front-to-back; once the queue is empty every
/// call fails, which drives callers onto their fallback path.
#[derive(Clone, Default)]
pub struct MockCompletionClient {
    pub recorded_prompts: Arc<Mutex<Vec<String>>>,
    pub queued: Arc<Mutex<VecDeque<Result<String, CompletionError>>>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion(self, completion: &str) -> Self {
        self.queued
            .lock()
            .unwrap()
            .push_back(Ok(completion.to_string()));
        self
    }

    pub fn with_error(self, error: CompletionError) -> Self {
        self.queued.lock().unwrap().push_back(Err(error));
        self
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        // capture the prompt
        self.recorded_prompts
            .lock()
            .unwrap()
            .push(prompt.to_string());

        match self.queued.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Err(CompletionError::InvalidResponse(
                "no queued completion".to_string(),
            )),
        }
    }
}
