//! Test helpers: a scriptable actor that records what it receives.

use crate::messages::{Output, Payload};
use crate::registry::{Actor, ActorId, HandlerResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type Handler<I, R, E> = Arc<dyn Fn(I) -> HandlerResult<R, E> + Send + Sync>;

/// Actor whose handlers are closures; clones share the recorded inputs
pub struct ScriptedActor<R: Payload, E: Payload> {
    id: ActorId,
    receivers: Vec<ActorId>,
    on_result: Handler<R, R, E>,
    on_exception: Handler<E, R, E>,
    delay: Option<Duration>,
    results_seen: Arc<Mutex<Vec<R>>>,
    exceptions_seen: Arc<Mutex<Vec<E>>>,
}

impl<R: Payload, E: Payload> Clone for ScriptedActor<R, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            receivers: self.receivers.clone(),
            on_result: Arc::clone(&self.on_result),
            on_exception: Arc::clone(&self.on_exception),
            delay: self.delay,
            results_seen: Arc::clone(&self.results_seen),
            exceptions_seen: Arc::clone(&self.exceptions_seen),
        }
    }
}

impl<R: Payload, E: Payload> ScriptedActor<R, E> {
    /// Actor with the given receivers whose handlers return no output
    pub fn new(id: &str, receivers: &[&str]) -> Self {
        Self {
            id: ActorId::named(id),
            receivers: receivers.iter().map(ActorId::named).collect(),
            on_result: Arc::new(|_| Ok(None)),
            on_exception: Arc::new(|_| Ok(None)),
            delay: None,
            results_seen: Arc::default(),
            exceptions_seen: Arc::default(),
        }
    }

    pub fn on_result<F>(mut self, handler: F) -> Self
    where
        F: Fn(R) -> HandlerResult<R, E> + Send + Sync + 'static,
    {
        self.on_result = Arc::new(handler);
        self
    }

    pub fn on_exception<F>(mut self, handler: F) -> Self
    where
        F: Fn(E) -> HandlerResult<R, E> + Send + Sync + 'static,
    {
        self.on_exception = Arc::new(handler);
        self
    }

    /// Map every result to the given output
    pub fn emitting(self, output: Output<R, E>) -> Self {
        self.on_result(move |_| Ok(Some(output.clone())))
    }

    /// Sleep this long inside every handler call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn results_seen(&self) -> Vec<R> {
        self.results_seen.lock().clone()
    }

    pub fn exceptions_seen(&self) -> Vec<E> {
        self.exceptions_seen.lock().clone()
    }

    pub fn into_dyn(self) -> Arc<dyn Actor<R, E>> {
        Arc::new(self)
    }
}

#[async_trait]
impl<R: Payload, E: Payload> Actor<R, E> for ScriptedActor<R, E> {
    fn id(&self) -> &ActorId {
        &self.id
    }

    fn receiving_actors(&self) -> &[ActorId] {
        &self.receivers
    }

    async fn process_result(&self, data: R) -> HandlerResult<R, E> {
        self.results_seen.lock().push(data.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.on_result)(data)
    }

    async fn process_exception(&self, data: E) -> HandlerResult<R, E> {
        self.exceptions_seen.lock().push(data.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.on_exception)(data)
    }
}
