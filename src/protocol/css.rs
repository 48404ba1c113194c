//! Complete secret sharing: bivariate-polynomial sharing with row/column
//! cross-checking and a happiness vote gating completion.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{Mutex, Notify};

use crate::error::Result;
use crate::field::{BivariatePolynomial, FieldElement, Polynomial};
use crate::net::{MessageBody, PartyId, SecretId, Transport};

type Key = (PartyId, SecretId);

#[derive(Default)]
struct CssState {
    my_row: Option<Polynomial>,
    my_col: Option<Polynomial>,
    subshares: HashMap<PartyId, (FieldElement, FieldElement)>,
    subshares_sent: bool,
    happy_votes: HashMap<PartyId, bool>,
    happy_sent: bool,
    /// `None` until the happiness quorum resolves; then `Some(final share)`.
    completed: Option<FieldElement>,
    reconstruct_shares: HashMap<PartyId, FieldElement>,
    reconstructed: Option<FieldElement>,
}

#[derive(Default)]
struct CssEntry {
    state: Mutex<CssState>,
    notify: Notify,
}

pub struct Css {
    n: u32,
    f: u32,
    transport: Arc<dyn Transport>,
    rng: Mutex<StdRng>,
    entries: dashmap::DashMap<Key, Arc<CssEntry>>,
}

impl Css {
    #[must_use]
    pub fn new(n: u32, f: u32, transport: Arc<dyn Transport>, seed: u64) -> Self {
        Self {
            n,
            f,
            transport,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            entries: dashmap::DashMap::new(),
        }
    }

    fn quorum(&self) -> usize {
        (self.n - self.f) as usize
    }

    fn happy_threshold(&self) -> usize {
        (self.n - self.f) as usize
    }

    fn reconstruct_threshold(&self) -> usize {
        (self.f + 1) as usize
    }

    fn entry(&self, dealer: PartyId, secret_id: &SecretId) -> Arc<CssEntry> {
        self.entries
            .entry((dealer, secret_id.clone()))
            .or_insert_with(|| Arc::new(CssEntry::default()))
            .clone()
    }

    /// Dealer path: builds a degree-`f` bivariate polynomial with `secret` at
    /// the origin and distributes row/column polynomials to every party.
    pub async fn deal(&self, secret_id: SecretId, secret: FieldElement) -> Result<()> {
        let dealer = self.transport.identity();
        let poly = {
            let mut rng = self.rng.lock().await;
            BivariatePolynomial::random(self.f as usize, secret, &mut rng)
        };
        for k in 0..self.n {
            let point = FieldElement::from(k);
            let row_coeffs = poly.row_polynomial(point).coeffs().to_vec();
            let col_coeffs = poly.col_polynomial(point).coeffs().to_vec();
            self.transport
                .send(
                    PartyId(k),
                    MessageBody::CssShare {
                        dealer,
                        secret_id: secret_id.clone(),
                        row_coeffs,
                        col_coeffs,
                    },
                )
                .await
                .map_err(|e| crate::error::Error::ProtocolViolation(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn handle_share(
        &self,
        dealer: PartyId,
        secret_id: SecretId,
        row_coeffs: Vec<FieldElement>,
        col_coeffs: Vec<FieldElement>,
    ) -> Result<()> {
        let entry = self.entry(dealer, &secret_id);
        let (my_row, my_col) = {
            let mut state = entry.state.lock().await;
            if state.my_row.is_some() {
                return Ok(()); // duplicate share from the dealer, ignored
            }
            let my_row = Polynomial::new(row_coeffs);
            let my_col = Polynomial::new(col_coeffs);
            state.my_row = Some(my_row.clone());
            state.my_col = Some(my_col.clone());
            state.subshares_sent = true;
            (my_row, my_col)
        };

        for j in 0..self.n {
            let point = FieldElement::from(j);
            self.transport
                .send(
                    PartyId(j),
                    MessageBody::CssSubshare {
                        dealer,
                        secret_id: secret_id.clone(),
                        row_eval: my_row.eval(point),
                        col_eval: my_col.eval(point),
                    },
                )
                .await
                .map_err(|e| crate::error::Error::ProtocolViolation(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn handle_subshare(
        &self,
        dealer: PartyId,
        secret_id: SecretId,
        from: PartyId,
        row_eval: FieldElement,
        col_eval: FieldElement,
    ) -> Result<()> {
        let entry = self.entry(dealer, &secret_id);
        let should_vote = {
            let mut state = entry.state.lock().await;
            state.subshares.insert(from, (row_eval, col_eval));
            state.subshares.len() >= self.quorum() && !state.happy_sent
        };
        if should_vote {
            let happy = {
                let mut state = entry.state.lock().await;
                let my_row = state.my_row.clone();
                let my_col = state.my_col.clone();
                let happy = match (&my_row, &my_col) {
                    (Some(row), Some(col)) => state.subshares.iter().all(|(j, (re, ce))| {
                        let x = j.as_field();
                        row.eval(x) == *re && col.eval(x) == *ce
                    }),
                    _ => false,
                };
                state.happy_sent = true;
                happy
            };
            tracing::debug!(?dealer, %secret_id, happy, "css: broadcasting happiness vote");
            self.transport
                .broadcast(MessageBody::CssHappy {
                    dealer,
                    secret_id: secret_id.clone(),
                    happy,
                })
                .await
                .map_err(|e| crate::error::Error::ProtocolViolation(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn handle_happy(
        &self,
        dealer: PartyId,
        secret_id: SecretId,
        from: PartyId,
        happy: bool,
    ) -> Result<()> {
        let entry = self.entry(dealer, &secret_id);
        let mut state = entry.state.lock().await;
        if state.completed.is_some() {
            return Ok(());
        }
        state.happy_votes.insert(from, happy);
        if state.happy_votes.len() >= self.happy_threshold() {
            let happy_count = state.happy_votes.values().filter(|&&h| h).count();
            let final_share = if happy_count >= self.happy_threshold() {
                state
                    .my_col
                    .as_ref()
                    .map(|c| c.eval(FieldElement::ZERO))
                    .unwrap_or(FieldElement::ZERO)
            } else {
                FieldElement::ZERO
            };
            state.completed = Some(final_share);
            tracing::info!(?dealer, %secret_id, happy_count, "css: sharing completed");
            drop(state);
            entry.notify.notify_waiters();
            return Ok(());
        }
        Ok(())
    }

    /// Blocks until this dealer/secret's sharing has completed (honestly or
    /// defaulted to zero), returning this party's final share `C(0)`.
    pub async fn share(&self, dealer: PartyId, secret_id: SecretId) -> FieldElement {
        let entry = self.entry(dealer, &secret_id);
        loop {
            if let Some(s) = entry.state.lock().await.completed {
                return s;
            }
            let notified = entry.notify.notified();
            if let Some(s) = entry.state.lock().await.completed {
                return s;
            }
            notified.await;
        }
    }

    /// Broadcasts this party's finalized share so every party can recover the
    /// dealer's secret.
    pub async fn start_reconstruct(&self, dealer: PartyId, secret_id: SecretId) -> Result<()> {
        let share = self.share(dealer, secret_id.clone()).await;
        self.transport
            .broadcast(MessageBody::CssReconstruct {
                dealer,
                secret_id,
                share,
            })
            .await
            .map_err(|e| crate::error::Error::ProtocolViolation(e.to_string()))
    }

    pub async fn handle_reconstruct(
        &self,
        dealer: PartyId,
        secret_id: SecretId,
        from: PartyId,
        share: FieldElement,
    ) -> Result<()> {
        let entry = self.entry(dealer, &secret_id);
        let mut state = entry.state.lock().await;
        if state.reconstructed.is_some() {
            return Ok(());
        }
        state.reconstruct_shares.insert(from, share);
        if state.reconstruct_shares.len() >= self.reconstruct_threshold() {
            let points: Vec<_> = state
                .reconstruct_shares
                .iter()
                .map(|(p, s)| (p.as_field(), *s))
                .collect();
            let poly = Polynomial::interpolate(&points)?;
            let secret = poly.eval(FieldElement::ZERO);
            state.reconstructed = Some(secret);
            tracing::info!(?dealer, %secret_id, "css: secret reconstructed");
            drop(state);
            entry.notify.notify_waiters();
        }
        Ok(())
    }

    /// Blocks until this dealer's secret has been reconstructed.
    pub async fn reconstruct(&self, dealer: PartyId, secret_id: SecretId) -> FieldElement {
        let entry = self.entry(dealer, &secret_id);
        loop {
            if let Some(s) = entry.state.lock().await.reconstructed {
                return s;
            }
            let notified = entry.notify.notified();
            if let Some(s) = entry.state.lock().await.reconstructed {
                return s;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod completeness_tests {
    use std::sync::Arc;

    use super::*;
    use crate::net::InMemoryNetwork;
    use crate::protocol::party::Party;

    #[tokio::test]
    async fn honest_dealer_shares_reconstruct_to_the_dealt_secret() {
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

        let secret = FieldElement::from(123u32);
        parties[0]
            .share_value("test_secret".to_string(), secret)
            .await
            .unwrap();
        for p in &parties[1..] {
            p.receive_share(PartyId(0), "test_secret".to_string()).await.unwrap();
        }

        let starts: Vec<_> = parties
            .iter()
            .map(|p| {
                let p = Arc::clone(p);
                tokio::spawn(async move {
                    p.css.start_reconstruct(PartyId(0), "test_secret".to_string()).await.unwrap();
                })
            })
            .collect();
        for s in starts {
            s.await.unwrap();
        }

        for p in &parties {
            let recovered = p.css.reconstruct(PartyId(0), "test_secret".to_string()).await;
            assert_eq!(recovered, secret);
        }

        for p in &parties {
            p.cancellation().cancel();
        }
        for d in dispatchers {
            let _ = d.await;
        }
    }
}
