//! Agreement on a common subset: compose per-sender RBC with per-party ABA.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Notify;

use crate::error::Result;
use crate::field::FieldElement;
use crate::net::PartyId;

use super::aba::Aba;
use super::rbc::Rbc;

pub struct Acs {
    n: u32,
    f: u32,
    rbc: Arc<Rbc>,
    aba: Arc<Aba>,
}

impl Acs {
    #[must_use]
    pub fn new(n: u32, f: u32, rbc: Arc<Rbc>, aba: Arc<Aba>) -> Self {
        Self { n, f, rbc, aba }
    }

    /// Broadcasts `value` via RBC. As soon as `n - f` of the `n` per-sender
    /// RBC instances have delivered, proposes `0` to every ABA instance whose
    /// RBC has not delivered yet (an up-to-`f` RBC may never deliver, e.g. a
    /// faulty sender that never broadcast a `VAL`, so this may never wait on
    /// it). Every RBC delivery independently proposes `1` to its own ABA
    /// instance as soon as it happens. Returns delivered values for the
    /// first `n - f` parties (ascending id) whose ABA decided `1`.
    pub async fn run(&self, value: FieldElement) -> Result<BTreeMap<PartyId, FieldElement>> {
        self.rbc.start(value).await?;

        let quorum = (self.n - self.f) as usize;
        let n = self.n;
        let delivered_count = Arc::new(AtomicUsize::new(0));
        let quorum_notify = Arc::new(Notify::new());

        // One spawned task per sender: propose `1` the moment its RBC
        // delivers, and bump the shared delivered-count so the quorum
        // watcher can fire. Spawned rather than joined inline — a faulty
        // sender's RBC may never deliver, and `run` must not wait on it.
        // The handles are aborted once `run` has what it needs, so a
        // never-delivering instance doesn't leak a task forever.
        let deliver_handles: Vec<_> = (0..n)
            .map(|i| {
                let rbc = Arc::clone(&self.rbc);
                let aba = Arc::clone(&self.aba);
                let delivered_count = Arc::clone(&delivered_count);
                let quorum_notify = Arc::clone(&quorum_notify);
                tokio::spawn(async move {
                    rbc.deliver(PartyId(i)).await;
                    let _ = aba.propose(i, true).await;
                    if delivered_count.fetch_add(1, Ordering::SeqCst) + 1 >= quorum {
                        quorum_notify.notify_waiters();
                    }
                })
            })
            .collect();

        // As soon as `quorum` RBCs have delivered, default every
        // not-yet-delivered instance's ABA proposal to `0`. `propose` is a
        // no-op (returns `AlreadyProposed`, ignored) for senders whose `1`
        // proposal already won the race.
        let default_task = {
            let aba = Arc::clone(&self.aba);
            let delivered_count = Arc::clone(&delivered_count);
            let quorum_notify = Arc::clone(&quorum_notify);
            async move {
                while delivered_count.load(Ordering::SeqCst) < quorum {
                    quorum_notify.notified().await;
                }
                join_all((0..n).map(|i| {
                    let aba = Arc::clone(&aba);
                    async move {
                        let _ = aba.propose(i, false).await;
                    }
                }))
                .await;
            }
        };

        // Only the quorum watcher is awaited directly: it resolves once
        // `n - f` RBCs have delivered, which is guaranteed since at most `f`
        // senders are faulty. Awaiting `deliver_handles` themselves here
        // would reintroduce the deadlock they were spawned to avoid.
        default_task.await;

        let decisions: Vec<bool> =
            join_all((0..n).map(|i| self.aba.decision(i))).await;

        let mut selected: Vec<PartyId> = decisions
            .iter()
            .enumerate()
            .filter(|(_, &d)| d)
            .map(|(i, _)| PartyId(i as u32))
            .collect();
        selected.sort();
        debug_assert!(selected.len() >= quorum);
        selected.truncate(quorum);

        let mut out = BTreeMap::new();
        for party in selected {
            // A selected party's ABA decided 1, which only happens once its
            // RBC delivered, so this resolves immediately.
            let value = self.rbc.deliver(party).await;
            out.insert(party, value);
        }

        for handle in deliver_handles {
            handle.abort();
        }

        Ok(out)
    }
}

#[cfg(test)]
mod set_size_tests {
    use std::sync::Arc;

    use super::*;
    use crate::net::{InMemoryNetwork, Transport};
    use crate::protocol::party::Party;

    #[tokio::test]
    async fn agrees_on_exactly_n_minus_f_parties() {
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

        let runs: Vec<_> = parties
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                tokio::spawn(async move { p.acs.run(p.id().as_field()).await.unwrap() })
            })
            .collect();

        for handle in runs {
            let result = handle.await.unwrap();
            assert_eq!(result.len(), 3); // n - f = 4 - 1
        }

        for p in &parties {
            p.cancellation().cancel();
        }
        for d in dispatchers {
            let _ = d.await;
        }
    }
}
