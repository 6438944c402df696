//! Actor Registry
//!
//! Actor identity, the actor capability trait and the immutable id → actor
//! map the dispatch loops resolve receivers against.

use crate::error::{ActorSystemError, Result};
use crate::messages::{Output, Payload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique actor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId {
    id: Arc<str>,
}

impl ActorId {
    /// Create new unique actor ID
    pub fn new() -> Self {
        Self {
            id: format!("actor-{}", Uuid::new_v4().simple()).into(),
        }
    }

    /// Create a readable actor ID
    pub fn named(name: impl AsRef<str>) -> Self {
        Self {
            id: name.as_ref().into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ActorId {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for ActorId {
    fn from(name: String) -> Self {
        Self { id: name.into() }
    }
}

/// What an actor handler hands back: an optional output batch, or a failure
pub type HandlerResult<R, E> = anyhow::Result<Option<Output<R, E>>>;

/// Processing unit driven by the actor system
///
/// `receiving_actors` must stay the same for the lifetime of a system; the
/// routing table is derived from it once at construction.
#[async_trait]
pub trait Actor<R: Payload, E: Payload>: Send + Sync + 'static {
    fn id(&self) -> &ActorId;

    /// Downstream actors that receive everything this actor produces
    fn receiving_actors(&self) -> &[ActorId];

    /// Handle a result routed to this actor
    async fn process_result(&self, data: R) -> HandlerResult<R, E>;

    /// Handle an exception routed to this actor
    async fn process_exception(&self, data: E) -> HandlerResult<R, E>;
}

/// Immutable map from actor id to actor, fixed at construction
pub struct ActorRegistry<R: Payload, E: Payload> {
    actors: HashMap<ActorId, Arc<dyn Actor<R, E>>>,
    /// Registration order, used wherever iteration must be deterministic
    order: Vec<ActorId>,
}

impl<R: Payload, E: Payload> ActorRegistry<R, E> {
    /// Build the registry, rejecting duplicate ids
    pub fn new(actors: Vec<Arc<dyn Actor<R, E>>>) -> Result<Self> {
        let mut map = HashMap::with_capacity(actors.len());
        let mut order = Vec::with_capacity(actors.len());

        for actor in actors {
            let id = actor.id().clone();
            if map.contains_key(&id) {
                return Err(ActorSystemError::DuplicateActor { actor_id: id });
            }
            tracing::debug!(actor_id = %id, receivers = actor.receiving_actors().len(), "Registering actor");
            order.push(id.clone());
            map.insert(id, actor);
        }

        Ok(Self { actors: map, order })
    }

    pub fn get(&self, id: &ActorId) -> Option<&Arc<dyn Actor<R, E>>> {
        self.actors.get(id)
    }

    /// Look up an actor, failing with `UnknownActor`
    pub fn require(&self, id: &ActorId) -> Result<&Arc<dyn Actor<R, E>>> {
        self.get(id).ok_or_else(|| ActorSystemError::unknown_actor(id))
    }

    pub fn contains(&self, id: &ActorId) -> bool {
        self.actors.contains_key(id)
    }

    /// Actor ids in registration order
    pub fn ids(&self) -> &[ActorId] {
        &self.order
    }

    /// Actors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Actor<R, E>>> {
        self.order.iter().filter_map(|id| self.actors.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<R: Payload, E: Payload> fmt::Debug for ActorRegistry<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("actors", &self.order)
            .finish()
    }
}
