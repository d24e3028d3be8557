//! Per-block write-back cache of the auctions a block touches.

use std::collections::BTreeMap;

use heed::RoTxn;

use crate::{
    state::{
        auction::{Auction, Op},
        Error, State,
    },
    types::{NameHash, OutPoint},
};

/// Auctions touched by the block in progress, lazy-loaded from the engine on
/// first touch. Mutations stay local until [`State::save_view`] flushes the
/// op logs, so transactions within a block see each other's effects.
#[derive(Default)]
pub struct View {
    auctions: BTreeMap<NameHash, Auction>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    /// Auction for `name`, creating a fresh record at `height` if none is
    /// cached or stored.
    pub fn ensure_auction(
        &mut self,
        state: &State,
        rotxn: &RoTxn,
        name: &[u8],
        height: u32,
    ) -> Result<&mut Auction, Error> {
        let name_hash = NameHash::of(name);
        if !self.auctions.contains_key(&name_hash) {
            let auction = match state.try_get_auction(rotxn, &name_hash)? {
                Some(auction) => auction,
                None => Auction::open(name, height),
            };
            self.auctions.insert(name_hash, auction);
        }
        Ok(self
            .auctions
            .get_mut(&name_hash)
            .expect("auction was just cached"))
    }

    /// Cached or stored auction for `name_hash`, if any.
    pub fn get_auction(
        &mut self,
        state: &State,
        rotxn: &RoTxn,
        name_hash: &NameHash,
    ) -> Result<Option<&mut Auction>, Error> {
        if !self.auctions.contains_key(name_hash) {
            if let Some(auction) = state.try_get_auction(rotxn, name_hash)? {
                self.auctions.insert(*name_hash, auction);
            }
        }
        Ok(self.auctions.get_mut(name_hash))
    }

    /// Auction owning the bid or reveal record at `outpoint`, resolved
    /// through the reverse index. Records staged by earlier transactions in
    /// the same block are visible before they are flushed.
    pub fn get_auction_for(
        &mut self,
        state: &State,
        rotxn: &RoTxn,
        outpoint: OutPoint,
    ) -> Result<Option<&mut Auction>, Error> {
        let name_hash = match state.try_get_name_for(rotxn, outpoint)? {
            Some(name_hash) => Some(name_hash),
            None => self.pending_name_for(outpoint),
        };
        match name_hash {
            Some(name_hash) => self.get_auction(state, rotxn, &name_hash),
            None => Ok(None),
        }
    }

    /// Search the cached op logs for a not-yet-flushed bid or reveal record
    /// at `outpoint`.
    fn pending_name_for(&self, outpoint: OutPoint) -> Option<NameHash> {
        for (name_hash, auction) in &self.auctions {
            for op in auction.ops.iter().rev() {
                match op {
                    Op::AddBid(staged) | Op::AddReveal(staged, _)
                        if *staged == outpoint =>
                    {
                        return Some(*name_hash);
                    }
                    Op::RemoveBid(staged) | Op::RemoveReveal(staged)
                        if *staged == outpoint =>
                    {
                        return None;
                    }
                    _ => {}
                }
            }
        }
        None
    }

    pub(in crate::state) fn into_auctions(
        self,
    ) -> BTreeMap<NameHash, Auction> {
        self.auctions
    }
}
