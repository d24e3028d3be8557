//! Per-name auction state and its pending-operation log.

use serde::{Deserialize, Serialize};

use crate::types::{Hash, NameHash, OutPoint, Params};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Bidding,
    Reveal,
    Closed,
}

/// One pending state-transition operation. Mutators append ops instead of
/// touching the store; [`crate::state::State::save_view`] replays them into
/// the block's write transaction.
#[derive(Clone, Debug, PartialEq)]
pub(in crate::state) enum Op {
    AddBid(OutPoint),
    RemoveBid(OutPoint),
    AddReveal(OutPoint, u64),
    RemoveReveal(OutPoint),
    Commit(Hash),
    Uncommit,
    AddUndo(OutPoint, Box<Auction>),
    RemoveUndo(OutPoint),
    AddRenewal(OutPoint, u32),
    RemoveRenewal(OutPoint),
    Save,
    Remove,
}

/// State of one name auction. One record exists per name ever bid on;
/// serialized as an opaque blob under the name hash.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Auction {
    pub name_hash: NameHash,
    /// Original name bytes, kept so the hash can be recomputed on undo.
    pub name: Vec<u8>,
    /// Outpoint of the current winning or updating output.
    pub owner: Option<OutPoint>,
    /// Height at which the current auction epoch started.
    pub height: u32,
    /// Height of the last renewal, or the epoch start.
    pub renewal: u32,
    /// Count of currently-recorded bids.
    pub bids: u32,
    /// Hash of the currently committed record, if any.
    pub data: Option<Hash>,
    #[serde(skip)]
    pub(in crate::state) ops: Vec<Op>,
}

impl Auction {
    /// Open a fresh auction for `name` at `height`.
    pub(in crate::state) fn open(name: &[u8], height: u32) -> Self {
        Self {
            name_hash: NameHash::of(name),
            name: name.to_vec(),
            owner: None,
            height,
            renewal: height,
            bids: 0,
            data: None,
            ops: Vec::new(),
        }
    }

    /// Auction phase at `height`; a pure function of the epoch start and the
    /// chain parameters.
    pub fn phase(&self, height: u32, params: &Params) -> Phase {
        let bidding_end = self.height.saturating_add(params.bidding_period);
        let reveal_end = bidding_end.saturating_add(params.reveal_period);
        if height < bidding_end {
            Phase::Bidding
        } else if height < reveal_end {
            Phase::Reveal
        } else {
            Phase::Closed
        }
    }

    pub(in crate::state) fn add_bid(&mut self, outpoint: OutPoint) {
        self.bids += 1;
        self.ops.push(Op::AddBid(outpoint));
    }

    pub(in crate::state) fn remove_bid(&mut self, outpoint: OutPoint) {
        self.bids -= 1;
        self.ops.push(Op::RemoveBid(outpoint));
    }

    pub(in crate::state) fn add_reveal(
        &mut self,
        outpoint: OutPoint,
        value: u64,
    ) {
        self.ops.push(Op::AddReveal(outpoint, value));
    }

    pub(in crate::state) fn remove_reveal(&mut self, outpoint: OutPoint) {
        self.ops.push(Op::RemoveReveal(outpoint));
    }

    pub(in crate::state) fn set_owner(&mut self, outpoint: OutPoint) {
        self.owner = Some(outpoint);
        self.ops.push(Op::Save);
    }

    /// Clear the owner and any committed record reference.
    pub(in crate::state) fn set_null(&mut self) {
        self.owner = None;
        self.data = None;
        self.ops.push(Op::Save);
    }

    pub(in crate::state) fn set_renewal(&mut self, height: u32) {
        self.renewal = height;
        self.ops.push(Op::Save);
    }

    /// Stage `value_hash` as the name's trie record.
    pub(in crate::state) fn commit(&mut self, value_hash: Hash) {
        self.data = Some(value_hash);
        self.ops.push(Op::Commit(value_hash));
    }

    /// Stage removal of the name's trie record.
    pub(in crate::state) fn uncommit(&mut self) {
        self.data = None;
        self.ops.push(Op::Uncommit);
    }

    /// Snapshot the current record under `key` for later rollback.
    pub(in crate::state) fn add_undo(&mut self, key: OutPoint) {
        let snapshot = Box::new(self.snapshot());
        self.ops.push(Op::AddUndo(key, snapshot));
    }

    pub(in crate::state) fn remove_undo(&mut self, key: OutPoint) {
        self.ops.push(Op::RemoveUndo(key));
    }

    pub(in crate::state) fn add_renewal(
        &mut self,
        key: OutPoint,
        prior_renewal: u32,
    ) {
        self.ops.push(Op::AddRenewal(key, prior_renewal));
    }

    pub(in crate::state) fn remove_renewal(&mut self, key: OutPoint) {
        self.ops.push(Op::RemoveRenewal(key));
    }

    /// Mark the record for deletion at flush time.
    pub(in crate::state) fn remove(&mut self) {
        self.ops.push(Op::Remove);
    }

    /// Reset to a fresh epoch starting at `height`. The caller snapshots
    /// first and uncommits afterwards.
    pub(in crate::state) fn reset(&mut self, height: u32) {
        self.owner = None;
        self.height = height;
        self.renewal = height;
        self.bids = 0;
        self.ops.push(Op::Save);
    }

    /// Restore a prior snapshot, re-staging its trie record if it had one.
    /// Pending ops are kept.
    pub(in crate::state) fn restore(&mut self, prior: Auction) {
        let Auction {
            name_hash,
            name,
            owner,
            height,
            renewal,
            bids,
            data,
            ops: _,
        } = prior;
        self.name_hash = name_hash;
        self.name = name;
        self.owner = owner;
        self.height = height;
        self.renewal = renewal;
        self.bids = bids;
        self.data = data;
        if let Some(value_hash) = self.data {
            self.ops.push(Op::Commit(value_hash));
        }
        self.ops.push(Op::Save);
    }

    fn snapshot(&self) -> Auction {
        let mut snapshot = self.clone();
        snapshot.ops.clear();
        snapshot
    }

    #[cfg(test)]
    pub(in crate::state) fn pending_ops(&self) -> usize {
        self.ops.len()
    }
}
