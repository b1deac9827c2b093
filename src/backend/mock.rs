//! Mock backend for testing.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::workload::Workload;

use super::traits::{Backend, InvocationError, LoadError, LoadedProgram, Variant};

/// Something the mock backend was asked to do, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Load,
    /// 1-based invocation number across the backend's lifetime
    Invoke(usize),
    Release,
}

/// Shared view of the calls a [`MockBackend`] received.
#[derive(Debug, Clone, Default)]
pub struct MockLog {
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockLog {
    fn push(&self, event: MockEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// All events recorded so far.
    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn load_calls(&self) -> usize {
        self.events().iter().filter(|e| **e == MockEvent::Load).count()
    }

    pub fn invoke_calls(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MockEvent::Invoke(_)))
            .count()
    }

    pub fn release_calls(&self) -> usize {
        self.events().iter().filter(|e| **e == MockEvent::Release).count()
    }
}

/// Configuration for mock backend responses.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Name to report
    pub name: String,
    /// Version to report
    pub version: Option<String>,
    /// Availability to report
    pub available: bool,
    /// Durations returned by successive invocations (cycled)
    pub durations: Vec<Duration>,
    /// Load failure message, if load should fail
    pub load_error: Option<String>,
    /// 1-based invocation numbers that fail
    pub failing_calls: BTreeSet<usize>,
}

impl MockConfig {
    /// Create a new mock config with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        MockConfig {
            name: name.into(),
            version: Some("mock-1.0.0".to_string()),
            available: true,
            durations: vec![Duration::from_millis(10)],
            load_error: None,
            failing_calls: BTreeSet::new(),
        }
    }

    /// Set the durations returned by successive invocations.
    pub fn with_durations_ms(mut self, durations_ms: &[u64]) -> Self {
        self.durations = durations_ms.iter().map(|ms| Duration::from_millis(*ms)).collect();
        self
    }

    /// Report the backend as absent from the runtime.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Make load fail.
    pub fn load_fails(mut self, message: impl Into<String>) -> Self {
        self.load_error = Some(message.into());
        self
    }

    /// Make the `call`-th invocation (1-based, warmup included) fail.
    pub fn fail_on_call(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }
}

/// Mock backend for unit testing.
///
/// Returns scripted durations without running any engine, and records every
/// load, invocation and release in a [`MockLog`].
pub struct MockBackend {
    config: MockConfig,
    log: MockLog,
    calls: Mutex<usize>,
}

impl MockBackend {
    /// Create a new mock backend with the given configuration.
    pub fn new(config: MockConfig) -> Self {
        MockBackend {
            config,
            log: MockLog::default(),
            calls: Mutex::new(0),
        }
    }

    /// Create a mock backend with default configuration.
    pub fn default_mock() -> Self {
        Self::new(MockConfig::new("mock"))
    }

    /// Handle on the call log; stays valid after the backend is moved.
    pub fn log(&self) -> MockLog {
        self.log.clone()
    }

    fn next_call(&self) -> usize {
        let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
        *calls += 1;
        *calls
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn variant(&self) -> Variant {
        Variant::InProcess
    }

    fn version(&self) -> Option<String> {
        self.config.version.clone()
    }

    fn is_available(&self) -> bool {
        self.config.available
    }

    fn load<'a>(&'a self, _workload: &Workload) -> Result<Box<dyn LoadedProgram + 'a>, LoadError> {
        self.log.push(MockEvent::Load);
        if let Some(message) = &self.config.load_error {
            return Err(LoadError::new(message.clone()));
        }
        Ok(Box::new(MockProgram { backend: self }))
    }
}

struct MockProgram<'a> {
    backend: &'a MockBackend,
}

impl LoadedProgram for MockProgram<'_> {
    fn invoke(&mut self) -> Result<Duration, InvocationError> {
        let call = self.backend.next_call();
        self.backend.log.push(MockEvent::Invoke(call));
        if self.backend.config.failing_calls.contains(&call) {
            return Err(InvocationError::Script(format!("mock invocation {call} failed")));
        }
        let durations = &self.backend.config.durations;
        if durations.is_empty() {
            return Ok(Duration::ZERO);
        }
        Ok(durations[(call - 1) % durations.len()])
    }
}

impl Drop for MockProgram<'_> {
    fn drop(&mut self) {
        self.backend.log.push(MockEvent::Release);
    }
}
