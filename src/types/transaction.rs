use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};

use super::{
    hashes::{self, BlockHash, NameHash, Txid},
    serde_hexstr_human_readable,
};

/// Width of an outpoint encoded as a storage key.
pub const OUTPOINT_KEY_LEN: usize = 36;

/// Reference to a transaction output.
///
/// The high bit of `vout` is reserved for synthetic outpoints that key undo
/// records; real outpoints never set it.
#[derive(
    BorshSerialize,
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    const SYNTHETIC_BIT: u32 = 0x8000_0000;

    pub fn new(txid: Txid, vout: u32) -> Self {
        debug_assert!(vout & Self::SYNTHETIC_BIT == 0);
        Self { txid, vout }
    }

    /// Synthetic outpoint keying the undo record for the output at `vout`.
    pub fn undo(txid: Txid, vout: u32) -> Self {
        debug_assert!(vout & Self::SYNTHETIC_BIT == 0);
        Self {
            txid,
            vout: vout | Self::SYNTHETIC_BIT,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.vout & Self::SYNTHETIC_BIT != 0
    }

    /// Encode as a storage key: txid (32 bytes) ‖ vout (4 bytes, LE).
    pub fn to_key(self) -> [u8; OUTPOINT_KEY_LEN] {
        let mut key = [0u8; OUTPOINT_KEY_LEN];
        key[..32].copy_from_slice(self.txid.as_slice());
        key[32..].copy_from_slice(&self.vout.to_le_bytes());
        key
    }

    /// Parse a storage key back to an outpoint.
    pub fn from_key(key: &[u8; OUTPOINT_KEY_LEN]) -> Self {
        let mut txid = [0u8; 32];
        txid.copy_from_slice(&key[..32]);
        let vout = u32::from_le_bytes(key[32..].try_into().unwrap());
        Self {
            txid: Txid(txid),
            vout,
        }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Typed annotation on an output constraining how it may be spent.
#[derive(
    BorshSerialize, Clone, Debug, Deserialize, Eq, PartialEq, Serialize,
)]
pub enum Covenant {
    None,
    /// Sealed bid on a name. Carries the name itself; the name hash is
    /// recomputed by the engine.
    Bid {
        #[serde(with = "serde_hexstr_human_readable")]
        name: Vec<u8>,
    },
    /// Opens a sealed bid; the revealed amount is the output value.
    Reveal { name_hash: NameHash },
    /// Returns a losing bid's value to the bidder.
    Redeem { name_hash: NameHash },
    /// Commits a record for the name; `renewal` optionally references a
    /// recent main-chain block to renew against.
    Update {
        name_hash: NameHash,
        #[serde(with = "serde_hexstr_human_readable")]
        data: Vec<u8>,
        renewal: Option<BlockHash>,
    },
    /// Moves the winning output without committing a record.
    Transfer { name_hash: NameHash },
    /// Gives the name up, reopening it for a future auction epoch.
    Release { name_hash: NameHash },
}

impl Covenant {
    pub fn kind(&self) -> CovenantKind {
        match self {
            Self::None => CovenantKind::None,
            Self::Bid { .. } => CovenantKind::Bid,
            Self::Reveal { .. } => CovenantKind::Reveal,
            Self::Redeem { .. } => CovenantKind::Redeem,
            Self::Update { .. } => CovenantKind::Update,
            Self::Transfer { .. } => CovenantKind::Transfer,
            Self::Release { .. } => CovenantKind::Release,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CovenantKind {
    None,
    Bid,
    Reveal,
    Redeem,
    Update,
    Transfer,
    Release,
}

#[derive(
    BorshSerialize, Clone, Debug, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct Output {
    /// Value in base units.
    pub value: u64,
    pub covenant: Covenant,
}

#[derive(
    BorshSerialize,
    Clone,
    Debug,
    Default,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
)]
pub struct Transaction {
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<Output>,
}

impl Transaction {
    pub fn txid(&self) -> Txid {
        hashes::hash(self).into()
    }
}

/// A transaction paired with the outputs its inputs consume, supplied by the
/// coin view. `spent_outputs[i]` is the prior output of `inputs[i]`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FilledTransaction {
    pub transaction: Transaction,
    pub spent_outputs: Vec<Output>,
}

impl FilledTransaction {
    pub fn txid(&self) -> Txid {
        self.transaction.txid()
    }

    pub fn inputs(&self) -> &[OutPoint] {
        &self.transaction.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.transaction.outputs
    }
}
