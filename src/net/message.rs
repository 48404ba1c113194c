use serde::{Deserialize, Serialize};

use crate::field::FieldElement;

/// Stable identifier for a party, `0..n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyId(pub u32);

impl PartyId {
    #[must_use]
    pub fn as_field(self) -> FieldElement {
        FieldElement::from(self.0)
    }
}

impl From<u32> for PartyId {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

/// Identifies a secret-sharing instance: which dealer, sharing what.
pub type SecretId = String;

/// A decoded AUX vote: `0`, `1`, or the "no strict plurality" wildcard `Bot`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuxValue {
    Zero,
    One,
    Bot,
}

/// Wire payload, one variant per message type in the protocol's taxonomy.
/// Sender identity is carried by the envelope (`Message::sender`), never
/// duplicated into the payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MessageBody {
    RbcVal {
        rbc_sender: PartyId,
        value: FieldElement,
    },
    RbcEcho {
        rbc_sender: PartyId,
        value: FieldElement,
    },
    RbcReady {
        rbc_sender: PartyId,
        value: FieldElement,
    },
    AbaEst {
        instance_id: u32,
        round: u32,
        value: bool,
    },
    AbaAux {
        instance_id: u32,
        round: u32,
        value: AuxValue,
    },
    CssShare {
        dealer: PartyId,
        secret_id: SecretId,
        row_coeffs: Vec<FieldElement>,
        col_coeffs: Vec<FieldElement>,
    },
    CssSubshare {
        dealer: PartyId,
        secret_id: SecretId,
        row_eval: FieldElement,
        col_eval: FieldElement,
    },
    CssHappy {
        dealer: PartyId,
        secret_id: SecretId,
        happy: bool,
    },
    CssReconstruct {
        dealer: PartyId,
        secret_id: SecretId,
        share: FieldElement,
    },
    ShareValue {
        secret_id: SecretId,
        share: FieldElement,
    },
    ReconstructValue {
        secret_id: SecretId,
        share: FieldElement,
    },
    OutputShare {
        recipient: PartyId,
        blinded: FieldElement,
    },
}

/// `(sender, receiver, body)` — the only unit of on-wire communication.
/// `receiver` is `None` for broadcast sends fanned out by the transport.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub sender: PartyId,
    pub receiver: PartyId,
    pub body: MessageBody,
}

impl Message {
    #[must_use]
    pub fn new(sender: PartyId, receiver: PartyId, body: MessageBody) -> Self {
        Self {
            sender,
            receiver,
            body,
        }
    }
}
