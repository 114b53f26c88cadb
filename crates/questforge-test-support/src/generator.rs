//! Mock `NarrativeGenerator` implementations for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use questforge_core::error::GeneratorError;
use questforge_core::generator::{NarrativeGenerator, NarrativeRequest, NarrativeResponse};

/// A generator that replays a scripted sequence of outcomes and records
/// every request it receives.
///
/// Outcomes are consumed front to back; a call past the end of the script
/// fails with a backend error so an over-eager pipeline shows up in tests.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<NarrativeResponse, GeneratorError>>>,
    requests: Mutex<Vec<NarrativeRequest>>,
}

impl ScriptedGenerator {
    /// Creates a generator that plays `outcomes` in order.
    #[must_use]
    pub fn new(outcomes: Vec<Result<NarrativeResponse, GeneratorError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a generator that answers every call with clones of `response`.
    ///
    /// Strictly speaking it answers the first `128` calls; that is beyond any
    /// reasonable test while keeping the script finite.
    #[must_use]
    pub fn always(response: &NarrativeResponse) -> Self {
        Self::new((0..128).map(|_| Ok(response.clone())).collect())
    }

    /// Every request received so far, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<NarrativeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NarrativeGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: NarrativeRequest,
    ) -> Result<NarrativeResponse, GeneratorError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GeneratorError::Backend("script exhausted".to_owned())))
    }
}

/// A generator that always fails with a backend error.
#[derive(Debug)]
pub struct FailingGenerator {
    message: String,
}

impl FailingGenerator {
    /// Fails every call with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl NarrativeGenerator for FailingGenerator {
    async fn generate(
        &self,
        _request: NarrativeRequest,
    ) -> Result<NarrativeResponse, GeneratorError> {
        Err(GeneratorError::Backend(self.message.clone()))
    }
}

/// A generator that never answers, for exercising timeout paths.
#[derive(Debug)]
pub struct StallingGenerator;

#[async_trait]
impl NarrativeGenerator for StallingGenerator {
    async fn generate(
        &self,
        _request: NarrativeRequest,
    ) -> Result<NarrativeResponse, GeneratorError> {
        std::future::pending().await
    }
}
