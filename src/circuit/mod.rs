//! Second-price auction circuit, evaluated gate-by-gate over secret shares
//! using [`Party`]'s BGW primitives. Every wire is named deterministically
//! (same structural name on every party) so `mul_shared`/`reconstruct`
//! broadcasts line up across the network without an explicit handshake.

use crate::error::Result;
use crate::field::FieldElement;
use crate::net::{PartyId, SecretId};
use crate::protocol::Party;

const ONE: FieldElement = FieldElement::ONE;

fn wire(ns: &str, suffix: impl std::fmt::Display) -> SecretId {
    format!("{ns}/{suffix}")
}

/// LSB-first decomposition of a plaintext bid, performed by the bidder
/// before each bit is independently shared via CSS.
#[must_use]
pub fn bit_decompose(value: u32, k: usize) -> Vec<bool> {
    (0..k).map(|i| (value >> i) & 1 == 1).collect()
}

/// A value's share together with the bit shares of the same value, needed by
/// [`compare_bits`] for any future comparison involving it.
#[derive(Clone)]
pub struct SharedValue {
    pub value: SecretId,
    pub bits: Vec<SecretId>,
}

/// A tournament-tree candidate: the surviving value's share, its bit shares
/// (so it can still be compared at the next level), and an indicator share
/// per original input marking which original bid this candidate carries.
#[derive(Clone)]
pub struct Candidate {
    pub value: SecretId,
    pub bits: Vec<SecretId>,
    pub indicator: Vec<SecretId>,
}

/// One party's local leaf for bid `i` out of `n`: its own shared value/bits,
/// and a locally-known (public) indicator vector `e_i`.
#[must_use]
pub fn leaf(party: &Party, shared: &SharedValue, i: usize, n: usize, ns: &str) -> Candidate {
    let indicator = (0..n)
        .map(|m| {
            let id = wire(ns, format_args!("leaf{i}/ind{m}"));
            party.const_share(FieldElement::from(m == i), id.clone());
            id
        })
        .collect();
    Candidate {
        value: shared.value.clone(),
        bits: shared.bits.clone(),
        indicator,
    }
}

/// `c = sum_{j=k-1..0} a_j(1-b_j) * prod_{l=j+1..k-1}(1-(a_l-b_l)^2)`, a
/// share of `1` iff the bit-vector `a` represents a strictly larger value
/// than `b`, else `0`.
pub async fn compare_bits(
    party: &Party,
    a_bits: &[SecretId],
    b_bits: &[SecretId],
    ns: &str,
) -> Result<SecretId> {
    let k = a_bits.len();
    debug_assert_eq!(k, b_bits.len());

    let enable_top = wire(ns, "cmp/enable_top");
    party.const_share(ONE, enable_top.clone());
    let mut enable = enable_top;

    let mut result = wire(ns, "cmp/result_top");
    party.const_share(FieldElement::ZERO, result.clone());

    for j in (0..k).rev() {
        let one_minus_b = wire(ns, format_args!("cmp/one_minus_b{j}"));
        party.local_affine(&b_bits[j], FieldElement::ZERO - ONE, ONE, one_minus_b.clone());

        let term = wire(ns, format_args!("cmp/term{j}"));
        party.mul_shared(&a_bits[j], &one_minus_b, term.clone()).await?;

        let contribution = wire(ns, format_args!("cmp/contribution{j}"));
        party.mul_shared(&term, &enable, contribution.clone()).await?;

        let next_result = wire(ns, format_args!("cmp/result{j}"));
        party.local_add(&result, &contribution, next_result.clone());
        result = next_result;

        if j > 0 {
            let diff = wire(ns, format_args!("cmp/diff{j}"));
            party.local_combine(&a_bits[j], ONE, &b_bits[j], FieldElement::ZERO - ONE, FieldElement::ZERO, diff.clone());

            let diff_sq = wire(ns, format_args!("cmp/diff_sq{j}"));
            party.mul_shared(&diff, &diff, diff_sq.clone()).await?;

            let one_minus_diff_sq = wire(ns, format_args!("cmp/one_minus_diff_sq{j}"));
            party.local_affine(&diff_sq, FieldElement::ZERO - ONE, ONE, one_minus_diff_sq.clone());

            let next_enable = wire(ns, format_args!("cmp/enable{j}"));
            party.mul_shared(&enable, &one_minus_diff_sq, next_enable.clone()).await?;
            enable = next_enable;
        }
    }

    Ok(result)
}

/// `c*a + (1-c)*b`, muxing a value/bit-vector/indicator-vector triple
/// between `left` and `right` by the comparison share `c`.
async fn mux_candidate(
    party: &Party,
    c: &SecretId,
    one_minus_c: &SecretId,
    left: &Candidate,
    right: &Candidate,
    ns: &str,
) -> Result<Candidate> {
    let value = mux_wire(party, c, one_minus_c, &left.value, &right.value, &wire(ns, "value")).await?;

    let mut bits = Vec::with_capacity(left.bits.len());
    for (l, (lb, rb)) in left.bits.iter().zip(right.bits.iter()).enumerate() {
        bits.push(mux_wire(party, c, one_minus_c, lb, rb, &wire(ns, format_args!("bit{l}"))).await?);
    }

    let mut indicator = Vec::with_capacity(left.indicator.len());
    for (m, (li, ri)) in left.indicator.iter().zip(right.indicator.iter()).enumerate() {
        indicator.push(
            mux_wire(party, c, one_minus_c, li, ri, &wire(ns, format_args!("ind{m}"))).await?,
        );
    }

    Ok(Candidate { value, bits, indicator })
}

async fn mux_wire(
    party: &Party,
    c: &SecretId,
    one_minus_c: &SecretId,
    left: &SecretId,
    right: &SecretId,
    ns: &SecretId,
) -> Result<SecretId> {
    let left_term = wire(ns, "left");
    party.mul_shared(c, left, left_term.clone()).await?;
    let right_term = wire(ns, "right");
    party.mul_shared(one_minus_c, right, right_term.clone()).await?;
    let out = wire(ns, "out");
    party.local_add(&left_term, &right_term, out.clone());
    Ok(out)
}

/// `max(a, b)` over shares, keeping the winner's bits and indicator vector
/// for use at the next tournament level. Ties resolve to `right` (`c == 0`
/// when `a == b`, by [`compare_bits`]'s strict-`>` definition).
pub async fn max_two(party: &Party, left: &Candidate, right: &Candidate, ns: &str) -> Result<Candidate> {
    let c = compare_bits(party, &left.bits, &right.bits, &wire(ns, "cmp")).await?;
    let one_minus_c = wire(ns, "one_minus_c");
    party.local_affine(&c, FieldElement::ZERO - ONE, ONE, one_minus_c.clone());
    mux_candidate(party, &c, &one_minus_c, left, right, &wire(ns, "mux")).await
}

/// Tournament-tree maximum over `n >= 1` candidates; an odd straggler
/// carries over to the next level untouched.
pub async fn find_max(party: &Party, candidates: Vec<Candidate>, ns: &str) -> Result<Candidate> {
    let mut level = candidates;
    let mut round = 0u32;
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut pair = 0u32;
        let mut it = level.into_iter();
        loop {
            let Some(a) = it.next() else { break };
            match it.next() {
                Some(b) => {
                    let pair_ns = wire(ns, format_args!("lvl{round}/pair{pair}"));
                    next.push(max_two(party, &a, &b, &pair_ns).await?);
                    pair += 1;
                }
                None => {
                    next.push(a);
                    break;
                }
            }
        }
        level = next;
        round += 1;
    }
    Ok(level.into_iter().next().expect("at least one candidate"))
}

/// Masks out the winner (per its indicator vector) and reruns [`find_max`]
/// over what remains, returning only the resulting value share.
pub async fn find_second_max(
    party: &Party,
    shares: &[SharedValue],
    winner_indicator: &[SecretId],
    ns: &str,
) -> Result<SecretId> {
    let n = shares.len();
    let mut masked = Vec::with_capacity(n);
    for (i, shared) in shares.iter().enumerate() {
        let cand_ns = wire(ns, format_args!("mask{i}"));
        let one_minus_chi = wire(&cand_ns, "one_minus_chi");
        party.local_affine(
            &winner_indicator[i],
            FieldElement::ZERO - ONE,
            ONE,
            one_minus_chi.clone(),
        );

        let mut masked_bits = Vec::with_capacity(shared.bits.len());
        let mut value = wire(&cand_ns, "value_acc0");
        party.const_share(FieldElement::ZERO, value.clone());
        for (l, bit) in shared.bits.iter().enumerate() {
            let masked_bit = wire(&cand_ns, format_args!("bit{l}"));
            party.mul_shared(&one_minus_chi, bit, masked_bit.clone()).await?;
            let weighted = wire(&cand_ns, format_args!("weighted{l}"));
            party.local_mul_const(&masked_bit, FieldElement::from(1u32 << l), weighted.clone());
            let next_value = wire(&cand_ns, format_args!("value_acc{}", l + 1));
            party.local_add(&value, &weighted, next_value.clone());
            value = next_value;
            masked_bits.push(masked_bit);
        }

        masked.push(leaf_from(party, value, masked_bits, i, n, &cand_ns));
    }

    let winner = find_max(party, masked, &wire(ns, "tournament")).await?;
    Ok(winner.value)
}

fn leaf_from(party: &Party, value: SecretId, bits: Vec<SecretId>, i: usize, n: usize, ns: &str) -> Candidate {
    let indicator = (0..n)
        .map(|m| {
            let id = wire(ns, format_args!("ind{m}"));
            party.const_share(FieldElement::from(m == i), id.clone());
            id
        })
        .collect();
    Candidate { value, bits, indicator }
}

/// Outcome of a second-price auction: the index of the winning bid and the
/// price they pay (the second-highest bid).
pub struct AuctionOutcome {
    pub winner_indicator: Vec<SecretId>,
    pub second_price: SecretId,
}

/// Runs the full second-price circuit over `n` bid shares, each `k` bits
/// wide.
pub async fn second_price_auction(party: &Party, shares: Vec<SharedValue>, ns: &str) -> Result<AuctionOutcome> {
    let n = shares.len();
    let leaves: Vec<Candidate> = shares
        .iter()
        .enumerate()
        .map(|(i, s)| leaf(party, s, i, n, &wire(ns, "leaves")))
        .collect();

    let winner = find_max(party, leaves, &wire(ns, "max")).await?;
    let second_price = find_second_max(party, &shares, &winner.indicator, &wire(ns, "second")).await?;

    Ok(AuctionOutcome {
        winner_indicator: winner.indicator,
        second_price,
    })
}

/// This party's best guess at which original index is `1` in `indicator`,
/// obtained by reconstructing each entry. Only meaningful once all indicator
/// shares are reconstructable (i.e. after the orchestrator's output-delivery
/// phase authorizes revealing them).
pub async fn reveal_winner(party: &Party, indicator: &[SecretId]) -> Result<Option<PartyId>> {
    for (i, id) in indicator.iter().enumerate() {
        if !party.reconstruct(id).await?.is_zero() {
            return Ok(Some(PartyId(i as u32)));
        }
    }
    Ok(None)
}
