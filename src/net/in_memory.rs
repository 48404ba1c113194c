use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::message::{Message, MessageBody, PartyId};
use super::transport::{Transport, TransportError};

/// An in-process reference transport: one `tokio::sync::mpsc` channel per
/// party. Parties named in `faulty` deterministically drop every outbound
/// send — a stricter, reproducible subcase of the omission-fault model (the
/// original reference implementation instead dropped sends with fixed
/// probability, which is not suitable for deterministic tests).
pub struct InMemoryNetwork {
    senders: Vec<mpsc::UnboundedSender<Message>>,
    faulty: HashSet<PartyId>,
}

impl InMemoryNetwork {
    /// Builds a fully connected network of `n` parties and returns one
    /// [`InMemoryTransport`] handle per party, indexed by [`PartyId`].
    #[must_use]
    pub fn new(n: u32, faulty: HashSet<PartyId>) -> Vec<InMemoryTransport> {
        let mut senders = Vec::with_capacity(n as usize);
        let mut receivers = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            receivers.push(rx);
        }

        let shared = Arc::new(InMemoryNetwork { senders, faulty });

        receivers
            .into_iter()
            .enumerate()
            .map(|(i, rx)| InMemoryTransport {
                id: PartyId(i as u32),
                network: Arc::clone(&shared),
                inbox: Mutex::new(rx),
            })
            .collect()
    }
}

/// One party's handle onto a shared [`InMemoryNetwork`].
pub struct InMemoryTransport {
    id: PartyId,
    network: Arc<InMemoryNetwork>,
    inbox: Mutex<mpsc::UnboundedReceiver<Message>>,
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn identity(&self) -> PartyId {
        self.id
    }

    fn party_count(&self) -> u32 {
        self.network.senders.len() as u32
    }

    async fn send(&self, dst: PartyId, body: MessageBody) -> Result<(), TransportError> {
        if self.network.faulty.contains(&self.id) {
            tracing::debug!(sender = ?self.id, dst = ?dst, "omission fault: dropping outbound message");
            return Ok(());
        }
        let sender = self
            .network
            .senders
            .get(dst.0 as usize)
            .ok_or(TransportError::UnknownParty(dst))?;
        sender
            .send(Message::new(self.id, dst, body))
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Result<Message, TransportError> {
        let mut inbox = self.inbox.lock().await;
        inbox.recv().await.ok_or(TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_point_to_point() {
        let mut transports = InMemoryNetwork::new(3, HashSet::new());
        let t1 = transports.remove(1);
        let t0 = transports.remove(0);

        t0.send(
            PartyId(1),
            MessageBody::RbcVal {
                rbc_sender: PartyId(0),
                value: 7u32.into(),
            },
        )
        .await
        .unwrap();

        let received = t1.receive().await.unwrap();
        assert_eq!(received.sender, PartyId(0));
        match received.body {
            MessageBody::RbcVal { value, .. } => assert_eq!(value, 7u32.into()),
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn faulty_party_drops_all_sends() {
        let faulty: HashSet<_> = [PartyId(0)].into_iter().collect();
        let mut transports = InMemoryNetwork::new(2, faulty);
        let t1 = transports.remove(1);
        let t0 = transports.remove(0);

        t0.send(
            PartyId(1),
            MessageBody::RbcVal {
                rbc_sender: PartyId(0),
                value: 1u32.into(),
            },
        )
        .await
        .unwrap();

        // Give the (never-sent) message a chance to have arrived, then
        // confirm the inbox is still empty by sending a second, honest
        // message and observing it arrives alone.
        t1.network
            .senders
            .get(1)
            .unwrap()
            .send(Message::new(
                PartyId(1),
                PartyId(1),
                MessageBody::RbcVal {
                    rbc_sender: PartyId(1),
                    value: 9u32.into(),
                },
            ))
            .unwrap();

        let received = t1.receive().await.unwrap();
        match received.body {
            MessageBody::RbcVal { value, .. } => assert_eq!(value, 9u32.into()),
            _ => panic!("wrong variant"),
        }
    }
}
