//! Bracha reliable broadcast: one state machine per (instance, original sender).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::field::FieldElement;
use crate::net::{MessageBody, PartyId, Transport};

#[derive(Default)]
struct SenderState {
    val: Option<FieldElement>,
    echo_sent: bool,
    ready_sent: Option<FieldElement>,
    echoed_by: HashMap<FieldElement, HashSet<PartyId>>,
    readied_by: HashMap<FieldElement, HashSet<PartyId>>,
    delivered: Option<FieldElement>,
}

#[derive(Default)]
struct SenderEntry {
    state: Mutex<SenderState>,
    notify: Notify,
}

/// Bracha RBC scoped to a single broadcast "instance" (the caller picks what
/// an instance means — e.g. one instance per input-sharing round). Holds one
/// [`SenderEntry`] per original broadcaster.
pub struct Rbc {
    n: u32,
    f: u32,
    transport: Arc<dyn Transport>,
    entries: dashmap::DashMap<PartyId, Arc<SenderEntry>>,
}

impl Rbc {
    #[must_use]
    pub fn new(n: u32, f: u32, transport: Arc<dyn Transport>) -> Self {
        Self {
            n,
            f,
            transport,
            entries: dashmap::DashMap::new(),
        }
    }

    fn echo_threshold(&self) -> usize {
        ((self.n + self.f + 1).div_ceil(2)) as usize
    }

    fn ready_threshold(&self) -> usize {
        (self.f + 1) as usize
    }

    fn deliver_threshold(&self) -> usize {
        (2 * self.f + 1) as usize
    }

    fn entry(&self, rbc_sender: PartyId) -> Arc<SenderEntry> {
        self.entries
            .entry(rbc_sender)
            .or_insert_with(|| Arc::new(SenderEntry::default()))
            .clone()
    }

    /// Broadcasts `value` as this party, tagged as the RBC sender.
    pub async fn start(&self, value: FieldElement) -> crate::error::Result<()> {
        let rbc_sender = self.transport.identity();
        self.handle_val(rbc_sender, value).await
    }

    pub async fn handle_val(&self, rbc_sender: PartyId, value: FieldElement) -> crate::error::Result<()> {
        let entry = self.entry(rbc_sender);
        let should_echo = {
            let mut state = entry.state.lock().await;
            if state.delivered.is_some() || state.val.is_some() {
                false
            } else {
                state.val = Some(value);
                state.echo_sent = true;
                true
            }
        };
        if should_echo {
            tracing::debug!(?rbc_sender, "rbc: echoing val");
            self.transport
                .broadcast(MessageBody::RbcEcho { rbc_sender, value })
                .await
                .map_err(|e| crate::error::Error::ProtocolViolation(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn handle_echo(
        &self,
        rbc_sender: PartyId,
        from: PartyId,
        value: FieldElement,
    ) -> crate::error::Result<()> {
        let entry = self.entry(rbc_sender);
        let should_ready = {
            let mut state = entry.state.lock().await;
            if state.delivered.is_some() {
                return Ok(());
            }
            state.echoed_by.entry(value).or_default().insert(from);
            let count = state.echoed_by[&value].len();
            if count >= self.echo_threshold() && state.ready_sent.is_none() {
                state.ready_sent = Some(value);
                true
            } else {
                false
            }
        };
        if should_ready {
            tracing::debug!(?rbc_sender, "rbc: echo threshold reached, sending ready");
            self.transport
                .broadcast(MessageBody::RbcReady { rbc_sender, value })
                .await
                .map_err(|e| crate::error::Error::ProtocolViolation(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn handle_ready(
        &self,
        rbc_sender: PartyId,
        from: PartyId,
        value: FieldElement,
    ) -> crate::error::Result<()> {
        let entry = self.entry(rbc_sender);
        let mut amplify = false;
        let mut deliver = false;
        {
            let mut state = entry.state.lock().await;
            if state.delivered.is_some() {
                return Ok(());
            }
            state.readied_by.entry(value).or_default().insert(from);
            let count = state.readied_by[&value].len();
            if count >= self.ready_threshold() && state.ready_sent.is_none() {
                state.ready_sent = Some(value);
                amplify = true;
            }
            if count >= self.deliver_threshold() && state.delivered.is_none() {
                state.delivered = Some(value);
                deliver = true;
            }
        }
        if amplify {
            tracing::debug!(?rbc_sender, "rbc: ready threshold reached, amplifying");
            self.transport
                .broadcast(MessageBody::RbcReady { rbc_sender, value })
                .await
                .map_err(|e| crate::error::Error::ProtocolViolation(e.to_string()))?;
        }
        if deliver {
            tracing::info!(?rbc_sender, "rbc: delivered");
            entry.notify.notify_waiters();
        }
        Ok(())
    }

    /// Blocks until the value from `rbc_sender` has been delivered. Idempotent.
    pub async fn deliver(&self, rbc_sender: PartyId) -> FieldElement {
        let entry = self.entry(rbc_sender);
        loop {
            if let Some(value) = entry.state.lock().await.delivered {
                return value;
            }
            let notified = entry.notify.notified();
            if let Some(value) = entry.state.lock().await.delivered {
                return value;
            }
            notified.await;
        }
    }

    #[must_use]
    pub fn delivered_value(&self, rbc_sender: PartyId) -> Option<FieldElement> {
        self.entries
            .get(&rbc_sender)
            .and_then(|e| e.state.try_lock().ok().and_then(|s| s.delivered))
    }
}

#[cfg(test)]
mod agreement_tests {
    use std::sync::Arc;

    use super::*;
    use crate::net::{InMemoryNetwork, Transport};
    use crate::protocol::party::Party;

    #[tokio::test]
    async fn honest_broadcaster_delivers_same_value_everywhere() {
        let transports = InMemoryNetwork::new(4, Default::default());
        let parties: Vec<Arc<Party>> = transports
            .into_iter()
            .enumerate()
            .map(|(i, t)| Arc::new(Party::new(4, 1, Arc::new(t) as Arc<dyn Transport>, i as u64)))
            .collect();

        let dispatchers: Vec<_> = parties
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                tokio::spawn(async move {
                    let _ = p.run().await;
                })
            })
            .collect();

        parties[0].rbc.start(FieldElement::from(99u32)).await.unwrap();

        for p in &parties {
            assert_eq!(p.rbc.deliver(PartyId(0)).await, FieldElement::from(99u32));
        }

        for p in &parties {
            p.cancellation().cancel();
        }
        for d in dispatchers {
            let _ = d.await;
        }
    }
}
