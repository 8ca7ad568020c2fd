use serde::{Deserialize, Serialize};

use crate::Timestamp;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxVersion {
    V1 = 1,
}

impl TxVersion {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(TxVersion::V1),
            _ => None,
        }
    }
}

/// Closed set of ledger actions. The discriminant is part of the canonical
/// encoding; never renumber.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxKind {
    Register = 0,
    Affiliation = 1,
    DidApply = 2,
    DidRegister = 3,
    GovernmentAction = 4,
    ConflictResolution = 5,
    ValueTransfer = 6,
}

impl TxKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => TxKind::Register,
            1 => TxKind::Affiliation,
            2 => TxKind::DidApply,
            3 => TxKind::DidRegister,
            4 => TxKind::GovernmentAction,
            5 => TxKind::ConflictResolution,
            6 => TxKind::ValueTransfer,
            _ => return None,
        })
    }
}

/// An immutable record of an action to be committed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: TxVersion,
    /// Address or DID of the originator.
    pub sender: String,
    /// Address or DID of the counterparty.
    pub recipient: String,
    /// Zero for non-monetary actions.
    pub amount: f64,
    pub kind: TxKind,
    pub extra_data: Option<String>,
    pub timestamp: Timestamp,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: f64,
        kind: TxKind,
        extra_data: Option<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            version: TxVersion::V1,
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            kind,
            extra_data,
            timestamp,
        }
    }
}
