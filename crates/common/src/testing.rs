//! Test doubles shared by downstream crates

use std::collections::VecDeque;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;
use crate::process::{ScriptInvocation, ScriptOutput, ScriptRunner};

type Observer = Box<dyn Fn(&ScriptInvocation) + Send + Sync>;

/// [`ScriptRunner`] that records invocations and replays queued outputs
///
/// Once the queue is empty every invocation succeeds with empty output.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<ScriptInvocation>>,
    responses: Mutex<VecDeque<ScriptOutput>>,
    observer: Option<Observer>,
}

impl RecordingRunner {
    /// Creates a runner where everything succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the output for the next unanswered invocation
    pub fn respond_with(self, output: ScriptOutput) -> Self {
        self.responses.lock().push_back(output);
        self
    }

    /// Queues a successful invocation that printed `stdout`
    pub fn respond_stdout(self, stdout: &str) -> Self {
        self.respond_with(ScriptOutput {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    /// Queues a failed invocation
    pub fn respond_failure(self, exit_code: i32) -> Self {
        self.respond_with(ScriptOutput {
            exit_code: Some(exit_code),
            ..ScriptOutput::default()
        })
    }

    /// Calls `observer` at the moment each invocation would start
    pub fn with_observer(mut self, observer: impl Fn(&ScriptInvocation) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Every invocation so far, oldest first
    pub fn calls(&self) -> Vec<ScriptInvocation> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ScriptRunner for RecordingRunner {
    async fn run(&self, invocation: &ScriptInvocation) -> Result<ScriptOutput> {
        if let Some(observer) = &self.observer {
            observer(invocation);
        }

        self.calls.lock().push(invocation.clone());
        Ok(self.responses.lock().pop_front().unwrap_or_else(ScriptOutput::success))
    }
}
