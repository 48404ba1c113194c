//! Threshold-gated common coin: release a value for `index` only once `f + 1`
//! distinct parties have asked for it.
//!
//! This is a process-shared simplification standing in for a real
//! coin-tossing subprotocol; what matters to callers is the contract
//! (unpredictable, withheld until quorum, stable once generated), not how the
//! value is produced.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, Notify};

use crate::field::FieldElement;
use crate::net::PartyId;

#[derive(Default)]
struct IndexState {
    requesters: HashSet<PartyId>,
    value: Option<FieldElement>,
}

#[derive(Default)]
struct IndexEntry {
    state: Mutex<IndexState>,
    notify: Notify,
}

pub struct Beacon {
    f: u32,
    rng: Mutex<StdRng>,
    entries: dashmap::DashMap<u64, std::sync::Arc<IndexEntry>>,
}

impl Beacon {
    #[must_use]
    pub fn new(f: u32, seed: u64) -> Self {
        Self {
            f,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            entries: dashmap::DashMap::new(),
        }
    }

    fn entry(&self, index: u64) -> std::sync::Arc<IndexEntry> {
        self.entries
            .entry(index)
            .or_insert_with(|| std::sync::Arc::new(IndexEntry::default()))
            .clone()
    }

    /// Registers `party` as a requester for `index`, generating the value
    /// once `f + 1` distinct parties have asked, and returns it (blocking
    /// until generated).
    pub async fn request(&self, party: PartyId, index: u64) -> FieldElement {
        let entry = self.entry(index);
        let should_generate = {
            let mut state = entry.state.lock().await;
            state.requesters.insert(party);
            state.value.is_none() && state.requesters.len() >= (self.f + 1) as usize
        };
        if should_generate {
            let value = FieldElement::random(&mut *self.rng.lock().await);
            let mut state = entry.state.lock().await;
            if state.value.is_none() {
                state.value = Some(value);
                tracing::debug!(index, "beacon: value generated");
                entry.notify.notify_waiters();
            }
        }
        loop {
            if let Some(value) = entry.state.lock().await.value {
                return value;
            }
            let notified = entry.notify.notified();
            if let Some(value) = entry.state.lock().await.value {
                return value;
            }
            notified.await;
        }
    }
}

/// Encodes an ABA instance/round pair into a single beacon index, so that
/// every party requests the coin for the same logical flip.
#[must_use]
pub fn aba_coin_index(instance_id: u32, round: u32) -> u64 {
    (u64::from(instance_id) << 32) | u64::from(round)
}

/// Encodes an output-delivery recipient into a beacon index disjoint from
/// [`aba_coin_index`]'s range (tagged with a high bit no realistic `n`-sized
/// deployment would reach via `instance_id`), so the same shared [`Beacon`]
/// can serve both without accidentally reusing a coin flip as a blind.
#[must_use]
pub fn output_blind_index(recipient: u32) -> u64 {
    (1u64 << 48) | u64::from(recipient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn withholds_until_threshold() {
        let beacon = Beacon::new(1, 42); // f=1 => threshold f+1=2
        let b = std::sync::Arc::new(beacon);

        let b2 = b.clone();
        let first = tokio::spawn(async move { b2.request(PartyId(0), 7).await });
        tokio::task::yield_now().await;
        assert!(!first.is_finished());

        let second = b.request(PartyId(1), 7).await;
        let first_value = first.await.unwrap();
        assert_eq!(first_value, second);
    }

    #[tokio::test]
    async fn stable_once_generated() {
        let beacon = Beacon::new(0, 1); // f=0 => threshold 1
        let v1 = beacon.request(PartyId(0), 3).await;
        let v2 = beacon.request(PartyId(1), 3).await;
        assert_eq!(v1, v2);
    }
}
