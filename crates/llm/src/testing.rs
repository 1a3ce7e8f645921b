//! An in-process provider that replays scripted responses.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::LlmError;
use crate::provider::{CompletionProvider, CompletionRequest};

type Responder =
    Box<dyn Fn(usize, CompletionRequest<'_>) -> Result<String, LlmError> + Send + Sync>;

pub fn overloaded() -> LlmError {
    LlmError::Api {
        status: 503,
        message: "UNAVAILABLE: The model is overloaded. Please try again later.".to_string(),
    }
}

pub struct ScriptedProvider {
    respond: Responder,
    delay: Duration,
    delay_first_only: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// Respond with `f(call_index, request)`.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(usize, CompletionRequest<'_>) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(f),
            delay: Duration::ZERO,
            delay_first_only: false,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Replay `responses` in call order; calls past the end get `EmptyResponse`.
    pub fn sequence(responses: Vec<Result<String, LlmError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::from_fn(move |_, _| {
            queue
                .lock()
                .map_err(|_| LlmError::Decode("poisoned script".into()))?
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        })
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self.delay_first_only = false;
        self
    }

    /// Sleep before answering the first call only.
    pub fn with_delay_on_first(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self.delay_first_only = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl CompletionProvider for ScriptedProvider {
    async fn generate(&self, request: CompletionRequest<'_>) -> Result<String, LlmError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.to_string());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = if self.delay_first_only && index > 0 {
            Duration::ZERO
        } else {
            self.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.respond)(index, request)
    }
}
