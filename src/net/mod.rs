//! The protocol's sole I/O boundary: message shapes and the transport trait
//! that moves them between parties.

pub mod in_memory;
pub mod message;
pub mod transport;

pub use in_memory::{InMemoryNetwork, InMemoryTransport};
pub use message::{AuxValue, Message, MessageBody, PartyId, SecretId};
pub use transport::{Transport, TransportError};
