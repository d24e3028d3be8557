//! The name-auction state machine.
//!
//! [`State`] owns the databases backing the six key families plus the name
//! trie. The connect and disconnect engines mutate auctions through a
//! per-block [`View`]; [`State::save_view`] replays the accumulated op logs
//! into the caller's write transaction, which is the only durable effect the
//! engine ever has.

use std::collections::BTreeMap;
use std::ops::Bound;

use heed::{
    types::{Bytes, SerdeBincode, Unit},
    Database, RoTxn, RwTxn,
};

use crate::types::{
    BlockHash, Hash, NameHash, OutPoint, TrieRoot, OUTPOINT_KEY_LEN,
};

pub mod auction;
pub mod block;
pub mod covenants;
pub mod error;
mod trie;
mod view;

use auction::Op;
pub use auction::{Auction, Phase};
pub use error::Error;
use trie::NameTrie;
pub use view::View;

/// Header metadata the engine needs when validating renewal references.
#[derive(Clone, Copy, Debug)]
pub struct ChainEntry {
    pub hash: BlockHash,
    pub height: u32,
}

/// Read-only access to the header chain, supplied by the validator.
pub trait ChainView {
    fn try_get_entry(&self, block_hash: &BlockHash) -> Option<ChainEntry>;
    fn is_main_chain(&self, entry: &ChainEntry) -> bool;
}

const NAME_RECORD_KEY_LEN: usize = 32 + OUTPOINT_KEY_LEN;

/// Key for the bid and reveal families: `name_hash ‖ txid ‖ vout`.
fn name_record_key(
    name_hash: &NameHash,
    outpoint: OutPoint,
) -> [u8; NAME_RECORD_KEY_LEN] {
    let mut key = [0u8; NAME_RECORD_KEY_LEN];
    key[..32].copy_from_slice(name_hash.as_bytes());
    key[32..].copy_from_slice(&outpoint.to_key());
    key
}

fn outpoint_from_record_key(key: &[u8]) -> OutPoint {
    let tail: &[u8; OUTPOINT_KEY_LEN] = key[32..]
        .try_into()
        .expect("name record keys have fixed width");
    OutPoint::from_key(tail)
}

#[derive(Clone)]
pub struct State {
    /// Per-name auction records
    auctions: Database<SerdeBincode<NameHash>, SerdeBincode<Auction>>,
    /// Maps bid and reveal outpoints back to the name they belong to
    names_by_outpoint: Database<Bytes, SerdeBincode<NameHash>>,
    /// Bid markers, keyed by name hash then outpoint
    bids: Database<Bytes, Unit>,
    /// Revealed bid values
    reveals: Database<Bytes, SerdeBincode<u64>>,
    /// Auction snapshots for rollback, keyed by the outpoint that caused the
    /// transition being undone
    undos: Database<Bytes, SerdeBincode<Auction>>,
    /// Prior renewal heights, keyed by the renewing input's outpoint
    renewal_undos: Database<Bytes, SerdeBincode<u32>>,
    trie: NameTrie,
}

impl State {
    pub const NUM_DBS: u32 = 7;

    pub fn new(env: &heed::Env) -> Result<Self, Error> {
        let mut rwtxn = env.write_txn()?;
        let auctions = env.create_database(&mut rwtxn, Some("auctions"))?;
        let names_by_outpoint =
            env.create_database(&mut rwtxn, Some("names_by_outpoint"))?;
        let bids = env.create_database(&mut rwtxn, Some("bids"))?;
        let reveals = env.create_database(&mut rwtxn, Some("reveals"))?;
        let undos = env.create_database(&mut rwtxn, Some("auction_undos"))?;
        let renewal_undos =
            env.create_database(&mut rwtxn, Some("renewal_undos"))?;
        let trie = NameTrie::new(env, &mut rwtxn)?;
        rwtxn.commit()?;
        Ok(Self {
            auctions,
            names_by_outpoint,
            bids,
            reveals,
            undos,
            renewal_undos,
            trie,
        })
    }

    /// Return the auction for `name_hash`, if it exists.
    pub fn try_get_auction(
        &self,
        rotxn: &RoTxn,
        name_hash: &NameHash,
    ) -> Result<Option<Auction>, Error> {
        Ok(self.auctions.get(rotxn, name_hash)?)
    }

    /// Return the auction for `name_hash`. Returns an error if it does not
    /// exist.
    pub fn get_auction(
        &self,
        rotxn: &RoTxn,
        name_hash: &NameHash,
    ) -> Result<Auction, Error> {
        self.try_get_auction(rotxn, name_hash)?
            .ok_or(Error::MissingAuction {
                name_hash: *name_hash,
            })
    }

    /// Resolve the name a bid or reveal outpoint belongs to.
    pub fn try_get_name_for(
        &self,
        rotxn: &RoTxn,
        outpoint: OutPoint,
    ) -> Result<Option<NameHash>, Error> {
        Ok(self.names_by_outpoint.get(rotxn, &outpoint.to_key())?)
    }

    /// Outpoints of the currently-recorded bids under `name_hash`.
    pub fn bids_for(
        &self,
        rotxn: &RoTxn,
        name_hash: &NameHash,
    ) -> Result<Vec<OutPoint>, Error> {
        let (lo, hi) = Self::name_record_bounds(name_hash);
        let mut outpoints = Vec::new();
        for item in self.bids.range(rotxn, &(Bound::Included(&lo[..]), Bound::Included(&hi[..])))? {
            let (key, ()) = item?;
            outpoints.push(outpoint_from_record_key(key));
        }
        Ok(outpoints)
    }

    /// Revealed bids under `name_hash`, in key order.
    pub fn reveals_for(
        &self,
        rotxn: &RoTxn,
        name_hash: &NameHash,
    ) -> Result<Vec<(OutPoint, u64)>, Error> {
        let (lo, hi) = Self::name_record_bounds(name_hash);
        let mut reveals = Vec::new();
        for item in self.reveals.range(rotxn, &(Bound::Included(&lo[..]), Bound::Included(&hi[..])))? {
            let (key, value) = item?;
            reveals.push((outpoint_from_record_key(key), value));
        }
        Ok(reveals)
    }

    /// Scan the reveals under `name_hash` and return the outpoint of the
    /// highest one. Ties break toward the lexicographically later key.
    pub fn pick_winner(
        &self,
        rotxn: &RoTxn,
        name_hash: &NameHash,
    ) -> Result<Option<OutPoint>, Error> {
        let (lo, hi) = Self::name_record_bounds(name_hash);
        let mut winner: Option<(u64, OutPoint)> = None;
        for item in self.reveals.range(rotxn, &(Bound::Included(&lo[..]), Bound::Included(&hi[..])))? {
            let (key, value) = item?;
            match winner {
                Some((best, _)) if value < best => (),
                _ => winner = Some((value, outpoint_from_record_key(key))),
            }
        }
        Ok(winner.map(|(_, outpoint)| outpoint))
    }

    pub fn try_get_undo(
        &self,
        rotxn: &RoTxn,
        outpoint: OutPoint,
    ) -> Result<Option<Auction>, Error> {
        Ok(self.undos.get(rotxn, &outpoint.to_key())?)
    }

    pub fn try_get_renewal_undo(
        &self,
        rotxn: &RoTxn,
        outpoint: OutPoint,
    ) -> Result<Option<u32>, Error> {
        Ok(self.renewal_undos.get(rotxn, &outpoint.to_key())?)
    }

    /// Trie record committed for `name_hash`, if any.
    pub fn try_get_trie_record(
        &self,
        rotxn: &RoTxn,
        name_hash: &NameHash,
    ) -> Result<Option<Hash>, Error> {
        self.trie.try_get(rotxn, name_hash)
    }

    /// Current root of the name trie.
    pub fn trie_root(&self, rotxn: &RoTxn) -> Result<TrieRoot, Error> {
        self.trie.root(rotxn)
    }

    pub fn auction_count(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        Ok(self.auctions.len(rotxn)?)
    }

    pub fn bid_count(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        Ok(self.bids.len(rotxn)?)
    }

    pub fn name_index_count(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        Ok(self.names_by_outpoint.len(rotxn)?)
    }

    pub fn reveal_count(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        Ok(self.reveals.len(rotxn)?)
    }

    pub fn undo_count(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        Ok(self.undos.len(rotxn)?)
    }

    pub fn renewal_undo_count(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        Ok(self.renewal_undos.len(rotxn)?)
    }

    pub fn trie_record_count(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        self.trie.len(rotxn)
    }

    /// Byte-level contents of every key family. Disconnecting a block must
    /// restore the prior dump exactly.
    pub fn dump(&self, rotxn: &RoTxn) -> Result<StateDump, Error> {
        let mut entries = BTreeMap::new();
        let mut collect = |family: &'static str,
                           db: Database<Bytes, Bytes>|
         -> Result<(), Error> {
            for item in db.iter(rotxn)? {
                let (key, value) = item?;
                entries.insert((family, key.to_vec()), value.to_vec());
            }
            Ok(())
        };
        collect("a", self.auctions.remap_types::<Bytes, Bytes>())?;
        collect("n", self.names_by_outpoint.remap_types::<Bytes, Bytes>())?;
        collect("b", self.bids.remap_types::<Bytes, Bytes>())?;
        collect("r", self.reveals.remap_types::<Bytes, Bytes>())?;
        collect("u", self.undos.remap_types::<Bytes, Bytes>())?;
        collect("k", self.renewal_undos.remap_types::<Bytes, Bytes>())?;
        collect("t", self.trie.records.remap_types::<Bytes, Bytes>())?;
        Ok(StateDump(entries))
    }

    /// Flush a block's view: replay every auction's op log into `rwtxn`,
    /// then write (or delete) the auction records themselves. The op logs
    /// are consumed; nothing is durable until the caller commits.
    pub fn save_view(
        &self,
        rwtxn: &mut RwTxn,
        view: View,
    ) -> Result<(), Error> {
        for (name_hash, mut auction) in view.into_auctions() {
            let ops = std::mem::take(&mut auction.ops);
            let mut removed = false;
            for op in ops {
                match op {
                    Op::AddBid(outpoint) => {
                        let key = name_record_key(&name_hash, outpoint);
                        self.bids.put(rwtxn, &key, &())?;
                        self.names_by_outpoint.put(
                            rwtxn,
                            &outpoint.to_key(),
                            &name_hash,
                        )?;
                    }
                    Op::RemoveBid(outpoint) => {
                        let key = name_record_key(&name_hash, outpoint);
                        if !self.bids.delete(rwtxn, &key)? {
                            return Err(Error::MissingRecord {
                                family: "bid",
                                outpoint,
                            });
                        }
                        if !self
                            .names_by_outpoint
                            .delete(rwtxn, &outpoint.to_key())?
                        {
                            return Err(Error::MissingRecord {
                                family: "name index",
                                outpoint,
                            });
                        }
                    }
                    Op::AddReveal(outpoint, value) => {
                        let key = name_record_key(&name_hash, outpoint);
                        self.reveals.put(rwtxn, &key, &value)?;
                        self.names_by_outpoint.put(
                            rwtxn,
                            &outpoint.to_key(),
                            &name_hash,
                        )?;
                    }
                    Op::RemoveReveal(outpoint) => {
                        let key = name_record_key(&name_hash, outpoint);
                        if !self.reveals.delete(rwtxn, &key)? {
                            return Err(Error::MissingRecord {
                                family: "reveal",
                                outpoint,
                            });
                        }
                        if !self
                            .names_by_outpoint
                            .delete(rwtxn, &outpoint.to_key())?
                        {
                            return Err(Error::MissingRecord {
                                family: "name index",
                                outpoint,
                            });
                        }
                    }
                    Op::Commit(value_hash) => {
                        self.trie.insert(rwtxn, &name_hash, &value_hash)?;
                    }
                    Op::Uncommit => {
                        self.trie.remove(rwtxn, &name_hash)?;
                    }
                    Op::AddUndo(key, snapshot) => {
                        self.undos.put(rwtxn, &key.to_key(), &snapshot)?;
                    }
                    Op::RemoveUndo(key) => {
                        if !self.undos.delete(rwtxn, &key.to_key())? {
                            return Err(Error::MissingUndo { outpoint: key });
                        }
                    }
                    Op::AddRenewal(key, prior_renewal) => {
                        self.renewal_undos.put(
                            rwtxn,
                            &key.to_key(),
                            &prior_renewal,
                        )?;
                    }
                    Op::RemoveRenewal(key) => {
                        if !self.renewal_undos.delete(rwtxn, &key.to_key())? {
                            return Err(Error::MissingRenewalUndo {
                                outpoint: key,
                            });
                        }
                    }
                    Op::Save => removed = false,
                    Op::Remove => removed = true,
                }
            }
            if removed {
                if !self.auctions.delete(rwtxn, &name_hash)? {
                    return Err(Error::MissingAuction { name_hash });
                }
            } else {
                self.auctions.put(rwtxn, &name_hash, &auction)?;
            }
        }
        Ok(())
    }

    fn name_record_bounds(
        name_hash: &NameHash,
    ) -> ([u8; NAME_RECORD_KEY_LEN], [u8; NAME_RECORD_KEY_LEN]) {
        let mut lo = [0u8; NAME_RECORD_KEY_LEN];
        lo[..32].copy_from_slice(name_hash.as_bytes());
        let mut hi = [0xffu8; NAME_RECORD_KEY_LEN];
        hi[..32].copy_from_slice(name_hash.as_bytes());
        (lo, hi)
    }
}

/// Raw contents of every key family, for rollback assertions.
#[derive(Debug, Eq, PartialEq)]
pub struct StateDump(BTreeMap<(&'static str, Vec<u8>), Vec<u8>>);

impl StateDump {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
