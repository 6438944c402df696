//! Actor System Core
//!
//! Owns a fixed actor set, the two dispatch queues, the per-actor collected
//! output queues and the shutdown signal.
//!
//! ```text
//!  insert_*_message ──┐
//!                     ▼
//!        ┌──── results / exceptions queue ◄──── OutputDistributor
//!        │                                            ▲
//!        ▼                                            │ Output
//!   dispatch loop ── spawn per message ──► Actor::process_*
//!        │
//!        └── no receiver ──► CollectedOutputs[sender] ──► stream_actor_*
//! ```
//!
//! # Lifecycle
//!
//! `run()` starts both loops and returns once `kill()` is called. Loops are
//! aborted on shutdown; in-flight tasks are aborted but not awaited, so a
//! message may be left partially processed. Dropping the `run()` future shuts
//! the system down the same way.

use crate::collected::{CollectedOutputs, CollectedQueue};
use crate::config::ActorSystemConfig;
use crate::dispatch::{run_dispatch_loop, DispatchContext, DispatchFailure};
use crate::distributor::{DispatchReceivers, OutputDistributor};
use crate::error::{ActorSystemError, Result};
use crate::lanes::{Exceptions, Lane, Results};
use crate::messages::{Message, MessageTraceId, Payload};
use crate::metrics::SystemMetrics;
use crate::registry::{Actor, ActorId, ActorRegistry};
use crate::routing::RoutingTable;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle state of an actor system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Constructed, `run()` not called yet
    Idle,
    Running,
    Stopped,
}

/// Core actor system routing results and exceptions between actors
pub struct ActorSystem<R: Payload, E: Payload> {
    /// Shared with every dispatch task
    context: Arc<DispatchContext<R, E>>,

    routing: Arc<RoutingTable>,

    /// Queue receivers, taken by the first `run()`
    receivers: Arc<Mutex<Option<DispatchReceivers<R, E>>>>,

    shutdown: Arc<watch::Sender<bool>>,

    state: Arc<Mutex<SystemState>>,

    /// System ID for debugging
    system_id: String,
}

/// Tears the system down when `run()` returns or its future is dropped
struct RunGuard<R: Payload, E: Payload> {
    loops: Vec<JoinHandle<()>>,
    context: Arc<DispatchContext<R, E>>,
    state: Arc<Mutex<SystemState>>,
    system_id: String,
}

impl<R: Payload, E: Payload> Drop for RunGuard<R, E> {
    fn drop(&mut self) {
        for handle in &self.loops {
            handle.abort();
        }
        self.context.permits.close();
        let aborted = self.context.abort_inflight();
        *self.state.lock() = SystemState::Stopped;

        info!(
            system_id = %self.system_id,
            aborted_tasks = aborted,
            "Actor system stopped"
        );
    }
}

impl<R: Payload, E: Payload> ActorSystem<R, E> {
    /// Create an actor system with default configuration
    pub fn new(actors: Vec<Arc<dyn Actor<R, E>>>) -> Result<Self> {
        Self::with_config(actors, ActorSystemConfig::default())
    }

    /// Create an actor system over a fixed actor set
    pub fn with_config(actors: Vec<Arc<dyn Actor<R, E>>>, config: ActorSystemConfig) -> Result<Self> {
        config.validate()?;

        let system_id = format!("system-{}", Uuid::new_v4().simple());
        let registry = Arc::new(ActorRegistry::new(actors)?);
        let routing = RoutingTable::from_actors(&registry);

        for connection in routing.dangling() {
            warn!(
                system_id = %system_id,
                sender = %connection.sender,
                receiver = %connection.receiver,
                "Actor declares a receiver that is not part of the system"
            );
        }

        let metrics = Arc::new(SystemMetrics::default());
        let (distributor, receivers) = OutputDistributor::new(Arc::clone(&metrics));
        let collected = Arc::new(CollectedOutputs::new(registry.ids()));
        let (shutdown, _) = watch::channel(false);

        info!(
            system_id = %system_id,
            actors = registry.len(),
            connections = routing.len(),
            max_inflight_dispatches = config.max_inflight_dispatches,
            delivery_policy = ?config.delivery_policy,
            "Creating actor system"
        );

        let context = DispatchContext {
            permits: Arc::new(Semaphore::new(config.max_inflight_dispatches)),
            registry,
            distributor,
            collected,
            failures: CollectedQueue::new(),
            metrics,
            config,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        };

        Ok(Self {
            context: Arc::new(context),
            routing: Arc::new(routing),
            receivers: Arc::new(Mutex::new(Some(receivers))),
            shutdown: Arc::new(shutdown),
            state: Arc::new(Mutex::new(SystemState::Idle)),
            system_id,
        })
    }

    /// Run both dispatch loops until `kill()` is called
    pub async fn run(&self) -> Result<()> {
        let receivers = self
            .receivers
            .lock()
            .take()
            .ok_or(ActorSystemError::AlreadyRunning)?;
        *self.state.lock() = SystemState::Running;

        info!(system_id = %self.system_id, "Starting actor system");

        let guard = RunGuard {
            loops: vec![
                tokio::spawn(run_dispatch_loop::<R, E, Results>(
                    Arc::clone(&self.context),
                    receivers.results,
                )),
                tokio::spawn(run_dispatch_loop::<R, E, Exceptions>(
                    Arc::clone(&self.context),
                    receivers.exceptions,
                )),
            ],
            context: Arc::clone(&self.context),
            state: Arc::clone(&self.state),
            system_id: self.system_id.clone(),
        };

        let mut shutdown = self.shutdown.subscribe();
        // The sender lives in `self`, so this only returns once killed.
        let _ = shutdown.wait_for(|killed| *killed).await;

        drop(guard);
        Ok(())
    }

    /// Signal shutdown; `run()` returns and both loops are cancelled
    pub fn kill(&self) {
        info!(system_id = %self.system_id, "Kill requested");
        self.shutdown.send_replace(true);
    }

    pub fn is_killed(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn state(&self) -> SystemState {
        *self.state.lock()
    }

    /// Inject `data` on lane `L` without going through an actor's output
    ///
    /// With `to_actor`, one message is addressed to it. With `from_actor`, the
    /// data is fanned out as if that actor had produced it. Both may be given.
    /// Returns the number of messages enqueued.
    pub fn insert_message<L: Lane<R, E>>(
        &self,
        data: L::Item,
        from_actor: Option<&ActorId>,
        to_actor: Option<&ActorId>,
    ) -> Result<usize> {
        let sender = from_actor
            .map(|id| self.context.registry.require(id))
            .transpose()?;
        let trace_id = MessageTraceId::new();
        let distributor = &self.context.distributor;
        let mut enqueued = 0;

        match (sender, to_actor) {
            (None, None) => {
                debug!(kind = %L::KIND, "Injection without sender or receiver ignored");
            }
            (None, Some(to)) => {
                distributor.enqueue::<L>(Message::new(trace_id, data, None, Some(to.clone())))?;
                enqueued += 1;
            }
            (Some(sender), None) => {
                enqueued += distributor.fan_out::<L>(
                    trace_id,
                    vec![data],
                    sender.id(),
                    sender.receiving_actors(),
                )?;
            }
            (Some(sender), Some(to)) => {
                distributor.enqueue::<L>(Message::new(
                    trace_id,
                    data.clone(),
                    Some(sender.id().clone()),
                    Some(to.clone()),
                ))?;
                enqueued += 1;
                enqueued += distributor.fan_out::<L>(
                    trace_id,
                    vec![data],
                    sender.id(),
                    sender.receiving_actors(),
                )?;
            }
        }

        if self.context.config.debug && enqueued > 0 {
            debug!(kind = %L::KIND, trace_id = %trace_id, enqueued, "Injected message");
        }
        Ok(enqueued)
    }

    pub fn insert_result_message(
        &self,
        data: R,
        from_actor: Option<&ActorId>,
        to_actor: Option<&ActorId>,
    ) -> Result<usize> {
        self.insert_message::<Results>(data, from_actor, to_actor)
    }

    pub fn insert_exception_message(
        &self,
        data: E,
        from_actor: Option<&ActorId>,
        to_actor: Option<&ActorId>,
    ) -> Result<usize> {
        self.insert_message::<Exceptions>(data, from_actor, to_actor)
    }

    /// Stream an actor's collected messages on lane `L`
    ///
    /// The stream ends once nothing arrives for `timeout` (default:
    /// `no_outcome_timeout`).
    pub fn stream_actor_output<L: Lane<R, E>>(
        &self,
        actor: &ActorId,
        timeout: Option<Duration>,
    ) -> Result<impl Stream<Item = Message<L::Item>> + Send + 'static> {
        let queue = L::collected(&self.context.collected, actor)
            .ok_or_else(|| ActorSystemError::unknown_actor(actor))?;
        Ok(queue.stream(self.timeout_or_default(timeout)))
    }

    pub fn stream_actor_unpacked_results(
        &self,
        actor: &ActorId,
        timeout: Option<Duration>,
    ) -> Result<impl Stream<Item = R> + Send + 'static> {
        Ok(self
            .stream_actor_output::<Results>(actor, timeout)?
            .map(Message::into_data))
    }

    pub fn stream_actor_unpacked_exceptions(
        &self,
        actor: &ActorId,
        timeout: Option<Duration>,
    ) -> Result<impl Stream<Item = E> + Send + 'static> {
        Ok(self
            .stream_actor_output::<Exceptions>(actor, timeout)?
            .map(Message::into_data))
    }

    /// Stream surfaced delivery failures, ending after `timeout` of silence
    pub fn stream_failures(
        &self,
        timeout: Option<Duration>,
    ) -> impl Stream<Item = DispatchFailure> + Send + 'static {
        self.context.failures.stream(self.timeout_or_default(timeout))
    }

    /// Per-actor result and exception sink queues
    pub fn get_collected_outputs(&self) -> &CollectedOutputs<R, E> {
        &self.context.collected
    }

    pub fn connections(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn actor_ids(&self) -> &[ActorId] {
        self.context.registry.ids()
    }

    pub fn config(&self) -> &ActorSystemConfig {
        &self.context.config
    }

    pub fn metrics(&self) -> Arc<SystemMetrics> {
        Arc::clone(&self.context.metrics)
    }

    /// Number of per-message tasks currently running
    pub fn inflight_count(&self) -> usize {
        self.context.inflight.lock().len()
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    fn timeout_or_default(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or(self.context.config.no_outcome_timeout)
    }
}

impl<R: Payload, E: Payload> Clone for ActorSystem<R, E> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            routing: Arc::clone(&self.routing),
            receivers: Arc::clone(&self.receivers),
            shutdown: Arc::clone(&self.shutdown),
            state: Arc::clone(&self.state),
            system_id: self.system_id.clone(),
        }
    }
}

impl<R: Payload, E: Payload> std::fmt::Debug for ActorSystem<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("system_id", &self.system_id)
            .field("actors", &self.actor_ids())
            .field("state", &self.state())
            .finish()
    }
}
