//! Routing Table
//!
//! Sender → receiver pairs derived once from each actor's declared
//! `receiving_actors`. Read-only after construction.

use crate::messages::Payload;
use crate::registry::{ActorId, ActorRegistry};
use std::collections::BTreeSet;
use std::fmt;

/// Directed edge between two actors
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Connection {
    pub sender: ActorId,
    pub receiver: ActorId,
}

impl Connection {
    pub fn new(sender: ActorId, receiver: ActorId) -> Self {
        Self { sender, receiver }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.sender, self.receiver)
    }
}

/// De-duplicated set of connections between actors
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    connections: BTreeSet<Connection>,
    /// Receivers that name no known actor; kept, they fail at dispatch time
    dangling: BTreeSet<Connection>,
}

impl RoutingTable {
    /// Derive connections from a fixed actor set
    pub fn from_actors<R: Payload, E: Payload>(registry: &ActorRegistry<R, E>) -> Self {
        Self::from_declarations(
            registry
                .iter()
                .map(|actor| (actor.id().clone(), actor.receiving_actors().to_vec())),
        )
    }

    /// Derive connections from raw `(sender, receivers)` declarations
    pub fn from_declarations<I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = (ActorId, Vec<ActorId>)>,
    {
        let declarations: Vec<_> = declarations.into_iter().collect();
        let known: BTreeSet<&ActorId> = declarations.iter().map(|(id, _)| id).collect();

        let mut connections = BTreeSet::new();
        let mut dangling = BTreeSet::new();

        for (sender, receivers) in &declarations {
            for receiver in receivers {
                let connection = Connection::new(sender.clone(), receiver.clone());
                if !known.contains(receiver) {
                    dangling.insert(connection.clone());
                }
                connections.insert(connection);
            }
        }

        Self {
            connections,
            dangling,
        }
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Connections whose receiver is not a registered actor
    pub fn dangling(&self) -> impl Iterator<Item = &Connection> {
        self.dangling.iter()
    }

    pub fn receivers_of<'a>(&'a self, sender: &'a ActorId) -> impl Iterator<Item = &'a ActorId> {
        self.connections
            .iter()
            .filter(move |c| &c.sender == sender)
            .map(|c| &c.receiver)
    }

    pub fn senders_of<'a>(&'a self, receiver: &'a ActorId) -> impl Iterator<Item = &'a ActorId> {
        self.connections
            .iter()
            .filter(move |c| &c.receiver == receiver)
            .map(|c| &c.sender)
    }

    pub fn contains(&self, sender: &ActorId, receiver: &ActorId) -> bool {
        self.connections
            .contains(&Connection::new(sender.clone(), receiver.clone()))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
