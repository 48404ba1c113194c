//! The per-party runtime: one dispatcher that routes inbound messages to the
//! owning subprotocol instance, plus the BGW-style MPC primitives built on
//! top of [`Css`] shares.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::field::{FieldElement, Polynomial};
use crate::net::{Message, MessageBody, PartyId, SecretId, Transport};

use super::aba::Aba;
use super::acs::Acs;
use super::beacon::Beacon;
use super::css::Css;
use super::rbc::Rbc;

#[derive(Default)]
struct Collector {
    shares: tokio::sync::Mutex<BTreeMap<PartyId, FieldElement>>,
    notify: tokio::sync::Notify,
}

impl Collector {
    async fn insert(&self, from: PartyId, value: FieldElement) {
        self.shares.lock().await.insert(from, value);
        self.notify.notify_waiters();
    }

    /// Blocks until at least `threshold` distinct shares are present, then
    /// returns the lowest-id `threshold` of them.
    async fn await_quorum(&self, threshold: usize) -> Vec<(PartyId, FieldElement)> {
        loop {
            {
                let shares = self.shares.lock().await;
                if shares.len() >= threshold {
                    return shares.iter().take(threshold).map(|(&p, &v)| (p, v)).collect();
                }
            }
            let notified = self.notify.notified();
            {
                let shares = self.shares.lock().await;
                if shares.len() >= threshold {
                    return shares.iter().take(threshold).map(|(&p, &v)| (p, v)).collect();
                }
            }
            notified.await;
        }
    }
}

pub struct Party {
    id: PartyId,
    n: u32,
    f: u32,
    transport: Arc<dyn Transport>,
    pub beacon: Arc<Beacon>,
    pub rbc: Arc<Rbc>,
    pub aba: Arc<Aba>,
    pub css: Arc<Css>,
    pub acs: Acs,
    shared_values: dashmap::DashMap<SecretId, FieldElement>,
    mult_collectors: dashmap::DashMap<SecretId, Arc<Collector>>,
    reconstruct_collectors: dashmap::DashMap<SecretId, Arc<Collector>>,
    cancellation: CancellationToken,
}

impl Party {
    #[must_use]
    pub fn new(n: u32, f: u32, transport: Arc<dyn Transport>, seed: u64) -> Self {
        let id = transport.identity();
        let beacon = Arc::new(Beacon::new(f, seed));
        let rbc = Arc::new(Rbc::new(n, f, Arc::clone(&transport)));
        let aba = Arc::new(Aba::new(n, f, Arc::clone(&transport), Arc::clone(&beacon)));
        let css = Arc::new(Css::new(n, f, Arc::clone(&transport), seed.wrapping_add(1)));
        let acs = Acs::new(n, f, Arc::clone(&rbc), Arc::clone(&aba));
        Self {
            id,
            n,
            f,
            transport,
            beacon,
            rbc,
            aba,
            css,
            acs,
            shared_values: dashmap::DashMap::new(),
            mult_collectors: dashmap::DashMap::new(),
            reconstruct_collectors: dashmap::DashMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PartyId {
        self.id
    }

    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn mult_collector(&self, secret_id: &SecretId) -> Arc<Collector> {
        self.mult_collectors
            .entry(secret_id.clone())
            .or_insert_with(|| Arc::new(Collector::default()))
            .clone()
    }

    fn reconstruct_collector(&self, secret_id: &SecretId) -> Arc<Collector> {
        self.reconstruct_collectors
            .entry(secret_id.clone())
            .or_insert_with(|| Arc::new(Collector::default()))
            .clone()
    }

    /// Runs the dispatcher loop until cancelled.
    pub async fn run(&self) -> Result<()> {
        loop {
            tokio::select! {
                () = self.cancellation.cancelled() => return Err(Error::Cancelled),
                received = self.transport.receive() => {
                    let msg = received.map_err(|e| Error::ProtocolViolation(e.to_string()))?;
                    self.dispatch(msg).await?;
                }
            }
        }
    }

    pub async fn dispatch(&self, msg: Message) -> Result<()> {
        let from = msg.sender;
        match msg.body {
            MessageBody::RbcVal { rbc_sender, value } => self.rbc.handle_val(rbc_sender, value).await,
            MessageBody::RbcEcho { rbc_sender, value } => {
                self.rbc.handle_echo(rbc_sender, from, value).await
            }
            MessageBody::RbcReady { rbc_sender, value } => {
                self.rbc.handle_ready(rbc_sender, from, value).await
            }
            MessageBody::AbaEst {
                instance_id,
                round,
                value,
            } => self.aba.handle_est(instance_id, from, round, value).await,
            MessageBody::AbaAux {
                instance_id,
                round,
                value,
            } => self.aba.handle_aux(instance_id, from, round, value).await,
            MessageBody::CssShare {
                dealer,
                secret_id,
                row_coeffs,
                col_coeffs,
            } => self.css.handle_share(dealer, secret_id, row_coeffs, col_coeffs).await,
            MessageBody::CssSubshare {
                dealer,
                secret_id,
                row_eval,
                col_eval,
            } => {
                self.css
                    .handle_subshare(dealer, secret_id, from, row_eval, col_eval)
                    .await
            }
            MessageBody::CssHappy {
                dealer,
                secret_id,
                happy,
            } => self.css.handle_happy(dealer, secret_id, from, happy).await,
            MessageBody::CssReconstruct {
                dealer,
                secret_id,
                share,
            } => self.css.handle_reconstruct(dealer, secret_id, from, share).await,
            MessageBody::ShareValue { secret_id, share } => {
                self.mult_collector(&secret_id).insert(from, share).await;
                Ok(())
            }
            MessageBody::ReconstructValue { secret_id, share } => {
                self.reconstruct_collector(&secret_id).insert(from, share).await;
                Ok(())
            }
            MessageBody::OutputShare { .. } => Ok(()),
        }
    }

    /// Shares `value` as a new secret under `secret_id` (this party is the
    /// dealer) and returns this party's resulting share.
    pub async fn share_value(&self, secret_id: SecretId, value: FieldElement) -> Result<FieldElement> {
        self.css.deal(secret_id.clone(), value).await?;
        let share = self.css.share(self.id, secret_id.clone()).await;
        self.shared_values.insert(secret_id, share);
        Ok(share)
    }

    /// Waits for `dealer`'s sharing of `secret_id` to complete and records
    /// this party's share of it.
    pub async fn receive_share(&self, dealer: PartyId, secret_id: SecretId) -> Result<FieldElement> {
        let share = self.css.share(dealer, secret_id.clone()).await;
        self.shared_values.insert(secret_id, share);
        Ok(share)
    }

    #[must_use]
    pub fn get_share(&self, secret_id: &SecretId) -> FieldElement {
        self.shared_values
            .get(secret_id)
            .map(|v| *v)
            .unwrap_or(FieldElement::ZERO)
    }

    #[must_use]
    pub fn local_add(&self, a: &SecretId, b: &SecretId, result: SecretId) -> FieldElement {
        let sum = self.get_share(a).add(self.get_share(b));
        self.shared_values.insert(result, sum);
        sum
    }

    #[must_use]
    pub fn local_mul_const(&self, a: &SecretId, k: FieldElement, result: SecretId) -> FieldElement {
        let product = self.get_share(a).mul(k);
        self.shared_values.insert(result, product);
        product
    }

    /// Injects a public, already-known constant as a wire. Valid because a
    /// constant identical at every party is trivially a degree-0 Shamir
    /// sharing of itself — no network round needed.
    #[must_use]
    pub fn const_share(&self, value: FieldElement, id: SecretId) -> FieldElement {
        self.shared_values.insert(id, value);
        value
    }

    /// `coeff * share(a) + constant`, purely local linear combination.
    #[must_use]
    pub fn local_affine(
        &self,
        a: &SecretId,
        coeff: FieldElement,
        constant: FieldElement,
        result: SecretId,
    ) -> FieldElement {
        let value = self.get_share(a).mul(coeff).add(constant);
        self.shared_values.insert(result, value);
        value
    }

    /// `coeff_a * share(a) + coeff_b * share(b) + constant`, purely local.
    #[must_use]
    pub fn local_combine(
        &self,
        a: &SecretId,
        coeff_a: FieldElement,
        b: &SecretId,
        coeff_b: FieldElement,
        constant: FieldElement,
        result: SecretId,
    ) -> FieldElement {
        let value = self
            .get_share(a)
            .mul(coeff_a)
            .add(self.get_share(b).mul(coeff_b))
            .add(constant);
        self.shared_values.insert(result, value);
        value
    }

    /// BGW multiplication. Each party broadcasts its raw local product share
    /// `d_i = a_i * b_i` (a degree-`2f` sharing of `a*b`) and recovers a
    /// fresh degree-`f` share by Lagrange-interpolating the first `f + 1`
    /// (by ascending party id) received `d_i` values at its own point.
    ///
    /// This degree reduction is unverified: a corrupt party can broadcast an
    /// arbitrary `d_i`, and nothing here detects it. Securing this step
    /// would need a verifiable secret sharing layer this protocol does not
    /// specify.
    pub async fn mul_shared(&self, a: &SecretId, b: &SecretId, result: SecretId) -> Result<FieldElement> {
        let d_i = self.get_share(a).mul(self.get_share(b));
        let collector = self.mult_collector(&result);
        collector.insert(self.id, d_i).await;

        self.transport
            .broadcast(MessageBody::ShareValue {
                secret_id: result.clone(),
                share: d_i,
            })
            .await
            .map_err(|e| Error::ProtocolViolation(e.to_string()))?;

        let quorum = (self.n - self.f) as usize;
        let collected = collector.await_quorum(quorum).await;
        let parties: Vec<_> = collected.into_iter().take((self.f + 1) as usize).collect();
        let xs: Vec<FieldElement> = parties.iter().map(|(p, _)| p.as_field()).collect();

        let mut new_share = FieldElement::ZERO;
        for (i, (_, share)) in parties.iter().enumerate() {
            let coeff = Polynomial::lagrange_coefficient(i, &xs, self.id.as_field())?;
            new_share = new_share.add(coeff.mul(*share));
        }
        self.shared_values.insert(result, new_share);
        Ok(new_share)
    }

    /// Broadcasts this party's share and Lagrange-interpolates the first
    /// `f + 1` (by ascending party id) received shares at `x = 0`.
    pub async fn reconstruct(&self, secret_id: &SecretId) -> Result<FieldElement> {
        let my_share = self.get_share(secret_id);
        let collector = self.reconstruct_collector(secret_id);
        collector.insert(self.id, my_share).await;

        self.transport
            .broadcast(MessageBody::ReconstructValue {
                secret_id: secret_id.clone(),
                share: my_share,
            })
            .await
            .map_err(|e| Error::ProtocolViolation(e.to_string()))?;

        let collected = collector.await_quorum((self.f + 1) as usize).await;
        let points: Vec<_> = collected
            .into_iter()
            .map(|(p, v)| (p.as_field(), v))
            .collect();
        let poly = Polynomial::interpolate(&points)?;
        Ok(poly.eval(FieldElement::ZERO))
    }
}
