//! Asynchronous binary agreement with a common-coin escape hatch.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::error::{Error, Result};
use crate::net::{AuxValue, MessageBody, PartyId, Transport};

use super::beacon::{aba_coin_index, Beacon};

#[derive(Default)]
struct RoundState {
    est_voters: [HashSet<PartyId>; 2],
    aux_voters: [HashSet<PartyId>; 3],
    est_sent: bool,
    aux_sent: bool,
}

impl RoundState {
    fn est_total(&self) -> usize {
        self.est_voters[0].len() + self.est_voters[1].len()
    }

    fn aux_total(&self) -> usize {
        self.aux_voters.iter().map(HashSet::len).sum()
    }

    fn aux_index(value: AuxValue) -> usize {
        match value {
            AuxValue::Zero => 0,
            AuxValue::One => 1,
            AuxValue::Bot => 2,
        }
    }
}

struct InstanceState {
    proposed: bool,
    rounds: Vec<RoundState>,
    decided: Option<bool>,
}

impl Default for InstanceState {
    fn default() -> Self {
        Self {
            proposed: false,
            rounds: vec![RoundState::default()],
            decided: None,
        }
    }
}

#[derive(Default)]
struct InstanceEntry {
    state: Mutex<InstanceState>,
    round_notify: Notify,
    decision_notify: Notify,
}

impl InstanceEntry {
    fn ensure_round(state: &mut InstanceState, round: u32) {
        while state.rounds.len() <= round as usize {
            state.rounds.push(RoundState::default());
        }
    }
}

/// Byzantine asynchronous binary agreement, one state machine per
/// `instance_id`.
pub struct Aba {
    n: u32,
    f: u32,
    transport: Arc<dyn Transport>,
    beacon: Arc<Beacon>,
    entries: dashmap::DashMap<u32, Arc<InstanceEntry>>,
}

impl Aba {
    #[must_use]
    pub fn new(n: u32, f: u32, transport: Arc<dyn Transport>, beacon: Arc<Beacon>) -> Self {
        Self {
            n,
            f,
            transport,
            beacon,
            entries: dashmap::DashMap::new(),
        }
    }

    fn quorum(&self) -> usize {
        (self.n - self.f) as usize
    }

    fn entry(&self, instance_id: u32) -> Arc<InstanceEntry> {
        self.entries
            .entry(instance_id)
            .or_insert_with(|| Arc::new(InstanceEntry::default()))
            .clone()
    }

    pub async fn handle_est(
        &self,
        instance_id: u32,
        from: PartyId,
        round: u32,
        value: bool,
    ) -> Result<()> {
        let entry = self.entry(instance_id);
        let mut state = entry.state.lock().await;
        InstanceEntry::ensure_round(&mut state, round);
        state.rounds[round as usize].est_voters[usize::from(value)].insert(from);
        drop(state);
        entry.round_notify.notify_waiters();
        Ok(())
    }

    pub async fn handle_aux(
        &self,
        instance_id: u32,
        from: PartyId,
        round: u32,
        value: AuxValue,
    ) -> Result<()> {
        let entry = self.entry(instance_id);
        let mut state = entry.state.lock().await;
        InstanceEntry::ensure_round(&mut state, round);
        state.rounds[round as usize].aux_voters[RoundState::aux_index(value)].insert(from);
        drop(state);
        entry.round_notify.notify_waiters();
        Ok(())
    }

    /// Runs the full round loop for `instance_id` with initial proposal `v`,
    /// returning the agreed bit. Must be called at most once per instance.
    pub async fn propose(&self, instance_id: u32, v: bool) -> Result<bool> {
        let entry = self.entry(instance_id);
        {
            let mut state = entry.state.lock().await;
            if state.proposed {
                return Err(Error::AlreadyProposed(instance_id));
            }
            state.proposed = true;
        }

        let quorum = self.quorum();
        let mut estimate = v;
        let mut round = 0u32;

        loop {
            // EST phase.
            {
                let mut state = entry.state.lock().await;
                InstanceEntry::ensure_round(&mut state, round);
                state.rounds[round as usize].est_sent = true;
            }
            self.transport
                .broadcast(MessageBody::AbaEst {
                    instance_id,
                    round,
                    value: estimate,
                })
                .await
                .map_err(|e| Error::ProtocolViolation(e.to_string()))?;

            let (est0, est1) = self
                .wait_for(&entry, round, quorum, |r| r.est_total() >= quorum, |r| {
                    (r.est_voters[0].len(), r.est_voters[1].len())
                })
                .await;

            let aux = if est0 >= quorum {
                AuxValue::Zero
            } else if est1 >= quorum {
                AuxValue::One
            } else if est0 > est1 {
                AuxValue::Zero
            } else if est1 > est0 {
                AuxValue::One
            } else {
                AuxValue::Bot
            };

            // AUX phase.
            {
                let mut state = entry.state.lock().await;
                state.rounds[round as usize].aux_sent = true;
            }
            self.transport
                .broadcast(MessageBody::AbaAux {
                    instance_id,
                    round,
                    value: aux,
                })
                .await
                .map_err(|e| Error::ProtocolViolation(e.to_string()))?;

            let (aux0, aux1, _aux_bot) = self
                .wait_for(
                    &entry,
                    round,
                    quorum,
                    |r| r.aux_total() >= quorum,
                    |r| (r.aux_voters[0].len(), r.aux_voters[1].len(), r.aux_voters[2].len()),
                )
                .await;

            let zero_ready = aux0 >= quorum;
            let one_ready = aux1 >= quorum;

            if zero_ready && !one_ready {
                self.decide(&entry, false).await;
                return Ok(false);
            }
            if one_ready && !zero_ready {
                self.decide(&entry, true).await;
                return Ok(true);
            }

            let coin = self
                .beacon
                .request(self.transport.identity(), aba_coin_index(instance_id, round))
                .await;
            estimate = coin.value() % 2 == 1;
            round += 1;
        }
    }

    async fn decide(&self, entry: &InstanceEntry, decision: bool) {
        let mut state = entry.state.lock().await;
        if state.decided.is_none() {
            state.decided = Some(decision);
            tracing::info!(decision, "aba: decided");
        }
        drop(state);
        entry.decision_notify.notify_waiters();
    }

    /// Generic helper: re-checks `cond` each time this instance's round state
    /// changes, returning `extract`'s snapshot once `cond` holds.
    async fn wait_for<T>(
        &self,
        entry: &InstanceEntry,
        round: u32,
        _quorum: usize,
        cond: impl Fn(&RoundState) -> bool,
        extract: impl Fn(&RoundState) -> T,
    ) -> T {
        loop {
            {
                let state = entry.state.lock().await;
                if let Some(r) = state.rounds.get(round as usize) {
                    if cond(r) {
                        return extract(r);
                    }
                }
            }
            let notified = entry.round_notify.notified();
            {
                let state = entry.state.lock().await;
                if let Some(r) = state.rounds.get(round as usize) {
                    if cond(r) {
                        return extract(r);
                    }
                }
            }
            notified.await;
        }
    }

    /// Blocks until this instance has decided.
    pub async fn decision(&self, instance_id: u32) -> bool {
        let entry = self.entry(instance_id);
        loop {
            if let Some(d) = entry.state.lock().await.decided {
                return d;
            }
            let notified = entry.decision_notify.notified();
            if let Some(d) = entry.state.lock().await.decided {
                return d;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod validity_tests {
    use std::sync::Arc;

    use super::*;
    use crate::net::InMemoryNetwork;
    use crate::protocol::party::Party;

    #[tokio::test]
    async fn unanimous_proposal_decides_that_value() {
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

        let proposals: Vec<_> = parties
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                tokio::spawn(async move { p.aba.propose(0, true).await.unwrap() })
            })
            .collect();

        for handle in proposals {
            assert!(handle.await.unwrap());
        }

        for p in &parties {
            p.cancellation().cancel();
        }
        for d in dispatchers {
            let _ = d.await;
        }
    }
}
