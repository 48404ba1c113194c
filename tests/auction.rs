//! End-to-end scenarios: four parties, `f = 1`, five-bit bids, run over an
//! in-process network. Each party only learns its own output, so a scenario
//! runs all four parties' `run_auction` calls concurrently and compares every
//! party's private result against the expected outputs table.

use std::collections::HashSet;
use std::sync::Arc;

use vickrey_mpc::field::FieldElement;
use vickrey_mpc::net::{InMemoryNetwork, PartyId, Transport};
use vickrey_mpc::protocol::auction::run_auction;
use vickrey_mpc::protocol::Party;

const N: u32 = 4;
const K: usize = 5;

/// Wires up `N` parties over an in-process network, runs the auction with
/// the given bids concurrently on all of them, and returns each party's own
/// output (`outputs[i]` is party `i`'s private result).
async fn run_scenario(bids: [u32; 4], faulty: HashSet<PartyId>) -> [FieldElement; 4] {
    let transports = InMemoryNetwork::new(N, faulty);
    let parties: Vec<Arc<Party>> = transports
        .into_iter()
        .enumerate()
        .map(|(i, t)| Arc::new(Party::new(N, 1, Arc::new(t) as Arc<dyn Transport>, i as u64)))
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

    let auctions: Vec<_> = parties
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let p = Arc::clone(p);
            let bid = bids[i];
            tokio::spawn(async move { run_auction(&p, N, bid, K).await })
        })
        .collect();

    let mut outputs = [FieldElement::ZERO; 4];
    for (i, handle) in auctions.into_iter().enumerate() {
        outputs[i] = handle.await.expect("auction task panicked").expect("auction failed");
    }

    for p in &parties {
        p.cancellation().cancel();
    }
    for handle in dispatchers {
        let _ = handle.await;
    }

    outputs
}

fn expected(values: [u32; 4]) -> [FieldElement; 4] {
    values.map(FieldElement::from)
}

#[tokio::test]
async fn scenario_1_distinct_bids() {
    let outputs = run_scenario([15, 25, 10, 20], HashSet::new()).await;
    assert_eq!(outputs, expected([0, 20, 0, 0]));
}

#[tokio::test]
async fn scenario_2_ascending_bids() {
    let outputs = run_scenario([0, 1, 2, 3], HashSet::new()).await;
    assert_eq!(outputs, expected([0, 0, 0, 2]));
}

#[tokio::test]
async fn scenario_3_descending_bids() {
    let outputs = run_scenario([31, 30, 29, 28], HashSet::new()).await;
    assert_eq!(outputs, expected([30, 0, 0, 0]));
}

#[tokio::test]
async fn scenario_4_omission_faulty_party() {
    let faulty: HashSet<_> = [PartyId(3)].into_iter().collect();
    let outputs = run_scenario([18, 30, 22, 5], faulty).await;
    assert_eq!(outputs, expected([0, 22, 0, 0]));
}

#[tokio::test]
async fn scenario_5_mixed_bids() {
    let outputs = run_scenario([10, 20, 15, 18], HashSet::new()).await;
    assert_eq!(outputs, expected([0, 18, 0, 0]));
}

#[tokio::test]
async fn scenario_6_tie_is_right_biased() {
    let outputs = run_scenario([10, 10, 5, 5], HashSet::new()).await;
    assert_eq!(outputs, expected([0, 10, 0, 0]));
}
