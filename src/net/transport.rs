use async_trait::async_trait;
use thiserror::Error;

use super::message::{Message, MessageBody, PartyId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("party {0:?} is not known to this transport")]
    UnknownParty(PartyId),

    #[error("transport has been shut down")]
    Closed,
}

/// The core protocol's only I/O boundary. An async trait so an HTTP/TLS-backed
/// transport could stand in for the in-process reference implementation
/// without touching any subprotocol code.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// This transport endpoint's own identity.
    fn identity(&self) -> PartyId;

    /// Total number of parties known to this transport.
    fn party_count(&self) -> u32;

    /// Sends `body` to exactly `dst`. An omission-faulty sender may silently
    /// drop the send; the call still returns `Ok(())` in that case, matching
    /// the asynchronous-network contract (no acknowledgement is observable).
    async fn send(&self, dst: PartyId, body: MessageBody) -> Result<(), TransportError>;

    /// Sends `body` to every party in `0..party_count()`, including
    /// `self.identity()` — RBC and ABA both rely on self-sends counting
    /// toward their own quorums the same way a peer's send would.
    async fn broadcast(&self, body: MessageBody) -> Result<(), TransportError> {
        for i in 0..self.party_count() {
            self.send(PartyId(i), body.clone()).await?;
        }
        Ok(())
    }

    /// Blocks until the next message addressed to this party arrives.
    /// Messages from distinct senders may arrive in any order.
    async fn receive(&self) -> Result<Message, TransportError>;
}
