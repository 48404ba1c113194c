//! Four-phase second-price auction orchestrator: input sharing, agreement on
//! the participating set, circuit evaluation, and blinded output delivery.

use std::collections::BTreeSet;

use crate::circuit::{self, SharedValue};
use crate::error::Result;
use crate::field::FieldElement;
use crate::net::PartyId;

use super::beacon::output_blind_index;
use super::Party;

const ONE: FieldElement = FieldElement::ONE;

/// Runs the auction to completion and returns this party's own output: the
/// second price if it won, `0` otherwise. Every other party's output stays
/// hidden from this party by the blinding step in phase 4.
///
/// Phase 1's own-bid sharing and phase 2's participant agreement run
/// concurrently: neither depends on the other, and serializing them would
/// mean waiting out a full ACS round before this party's own CSS deal could
/// even start. Collecting *other* parties' bid bits is deferred until the
/// participant set is known (see [`receive_participant_bits`]) — a CSS
/// dealer that never deals (an omission-faulty party drops every outbound
/// send, including its `CssShare`s) never reaches happiness quorum, so
/// waiting on it unconditionally would hang forever. Restricting the wait to
/// the ACS-agreed set works because the same omission fault that would
/// silently stall a `CssShare` also stalls that party's own RBC broadcast,
/// which is what keeps it out of the agreed set in the first place.
pub async fn run_auction(party: &Party, n: u32, own_bid: u32, k: usize) -> Result<FieldElement> {
    let (own_result, participants_result) =
        tokio::join!(share_own_bits(party, own_bid, k), agree_on_participants(party));
    own_result?;
    let participants = participants_result?;

    receive_participant_bits(party, k, &participants).await?;

    let shares = gather_shares(party, n, k, &participants);
    let outcome = circuit::second_price_auction(party, shares, "auction").await?;

    deliver_outputs(party, &participants, &outcome.winner_indicator, &outcome.second_price).await
}

async fn share_own_bits(party: &Party, own_bid: u32, k: usize) -> Result<()> {
    let p = party.id().0;
    let bits = circuit::bit_decompose(own_bid, k);
    for (bit_idx, bit) in bits.into_iter().enumerate() {
        let secret_id = format!("bid_{p}_bit_{bit_idx}");
        party.share_value(secret_id, FieldElement::from(bit)).await?;
    }
    Ok(())
}

/// Waits only on the agreed participants' bid bits, skipping this party's
/// own (already shared by [`share_own_bits`]) and never waiting on a
/// non-participant's CSS deal, which may never complete.
async fn receive_participant_bits(party: &Party, k: usize, participants: &BTreeSet<PartyId>) -> Result<()> {
    for &p in participants {
        if p == party.id() {
            continue;
        }
        for bit_idx in 0..k {
            let secret_id = format!("bid_{}_bit_{bit_idx}", p.0);
            party.receive_share(p, secret_id).await?;
        }
    }
    Ok(())
}

/// Agrees on a size-`n - f` set of parties whose input shares count, via the
/// party's ACS instance. The RBC payload carried through ACS is a nonce (the
/// proposer's own id); only membership in the resulting set matters, the
/// bids themselves already live in the per-party-id secret ids from phase 1.
async fn agree_on_participants(party: &Party) -> Result<BTreeSet<PartyId>> {
    let proposal = FieldElement::from(party.id().0);
    let agreed = party.acs.run(proposal).await?;
    Ok(agreed.keys().copied().collect())
}

fn gather_shares(party: &Party, n: u32, k: usize, participants: &BTreeSet<PartyId>) -> Vec<SharedValue> {
    (0..n)
        .map(|p| {
            if participants.contains(&PartyId(p)) {
                bid_shared_value(party, p, k)
            } else {
                zero_shared_value(party, p, k)
            }
        })
        .collect()
}

/// Recombines bid `p`'s individually-shared bits into a single value share
/// via local linear combination (`sum bit_l * 2^l`) — no network round
/// needed since Shamir sharing is linear.
fn bid_shared_value(party: &Party, p: u32, k: usize) -> SharedValue {
    let mut bits = Vec::with_capacity(k);
    let mut value = format!("bid_{p}/acc0");
    party.const_share(FieldElement::ZERO, value.clone());
    for bit_idx in 0..k {
        let bit_id = format!("bid_{p}_bit_{bit_idx}");
        let weighted = format!("bid_{p}/weighted{bit_idx}");
        party.local_mul_const(&bit_id, FieldElement::from(1u32 << bit_idx), weighted.clone());
        let next_value = format!("bid_{p}/acc{}", bit_idx + 1);
        party.local_add(&value, &weighted, next_value.clone());
        value = next_value;
        bits.push(bit_id);
    }
    SharedValue { value, bits }
}

/// A non-participating party's bid is treated as a share of zero in every
/// bit, keeping the circuit's arity fixed at `n`.
fn zero_shared_value(party: &Party, p: u32, k: usize) -> SharedValue {
    let bits = (0..k)
        .map(|bit_idx| {
            let id = format!("bid_{p}_bit_{bit_idx}_absent");
            party.const_share(FieldElement::ZERO, id.clone());
            id
        })
        .collect();
    let value = format!("bid_{p}/absent_value");
    party.const_share(FieldElement::ZERO, value.clone());
    SharedValue { value, bits }
}

/// For every agreed-participant recipient `i`, deals a one-time random mask
/// only `i` knows (via CSS), adds it plus a fresh beacon value to `i`'s
/// output share, and reconstructs the sum publicly. Non-recipients see only
/// the blinded sum; `i` subtracts back its own mask and the (public) beacon
/// value to recover its output.
///
/// The recipient loop is restricted to `participants` rather than all `n`
/// parties for the same reason phase 1 restricts input collection: a party
/// excluded by ACS may never complete a CSS deal for its mask (its outbound
/// sends are the ones being dropped), so waiting on it here would hang.
/// A non-participant's own output is never set and stays `FieldElement::ZERO`.
async fn deliver_outputs(
    party: &Party,
    participants: &BTreeSet<PartyId>,
    winner_indicator: &[crate::net::SecretId],
    second_price: &crate::net::SecretId,
) -> Result<FieldElement> {
    let mut own_output = FieldElement::ZERO;

    for &recipient in participants {
        let i = recipient.0;
        let mask_id = format!("output_mask_{i}");
        let own_mask = if recipient == party.id() {
            let mask = FieldElement::random(&mut rand::thread_rng());
            party.share_value(mask_id.clone(), mask).await?;
            Some(mask)
        } else {
            party.receive_share(recipient, mask_id.clone()).await?;
            None
        };

        let o_i_id = format!("o_{i}");
        party
            .mul_shared(&winner_indicator[i as usize], second_price, o_i_id.clone())
            .await?;

        let rho = party.beacon.request(party.id(), output_blind_index(i)).await;

        let blinded_id = format!("blinded_{i}");
        party.local_combine(&o_i_id, ONE, &mask_id, ONE, rho, blinded_id.clone());

        let revealed = party.reconstruct(&blinded_id).await?;

        if let Some(mask) = own_mask {
            own_output = revealed.sub(mask).sub(rho);
        }
    }

    Ok(own_output)
}
