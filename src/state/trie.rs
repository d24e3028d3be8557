//! Binding to the authenticated name trie.
//!
//! Committed records live in a dedicated database mapping
//! `name_hash → BLAKE2b-256(data)`. Inserts and removals are staged through
//! the auction op log and land here inside the block's write transaction, so
//! the trie and the rest of the state advance atomically. The root is the
//! pairwise fold of the sorted leaves.

use heed::{
    types::{Bytes, SerdeBincode},
    Database, RoTxn, RwTxn,
};

use crate::{
    state::Error,
    types::{hashes::blake2b, Hash, NameHash, TrieRoot},
};

#[derive(Clone)]
pub(in crate::state) struct NameTrie {
    pub(in crate::state) records: Database<Bytes, SerdeBincode<Hash>>,
}

impl NameTrie {
    pub fn new(
        env: &heed::Env,
        rwtxn: &mut RwTxn,
    ) -> Result<Self, heed::Error> {
        let records = env.create_database(rwtxn, Some("name_trie"))?;
        Ok(Self { records })
    }

    pub fn insert(
        &self,
        rwtxn: &mut RwTxn,
        name_hash: &NameHash,
        value_hash: &Hash,
    ) -> Result<(), Error> {
        self.records
            .put(rwtxn, name_hash.as_bytes(), value_hash)?;
        Ok(())
    }

    /// Remove the record for `name_hash`. Removing an absent key is a no-op
    /// so vacuous uncommits stay symmetric under rollback.
    pub fn remove(
        &self,
        rwtxn: &mut RwTxn,
        name_hash: &NameHash,
    ) -> Result<(), Error> {
        self.records.delete(rwtxn, name_hash.as_bytes())?;
        Ok(())
    }

    pub fn try_get(
        &self,
        rotxn: &RoTxn,
        name_hash: &NameHash,
    ) -> Result<Option<Hash>, Error> {
        Ok(self.records.get(rotxn, name_hash.as_bytes())?)
    }

    pub fn len(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        Ok(self.records.len(rotxn)?)
    }

    /// Current root over all committed records.
    pub fn root(&self, rotxn: &RoTxn) -> Result<TrieRoot, Error> {
        let mut layer: Vec<Hash> = Vec::new();
        for item in self.records.iter(rotxn)? {
            let (key, value) = item?;
            let mut leaf = [0u8; 64];
            leaf[..32].copy_from_slice(key);
            leaf[32..].copy_from_slice(&value);
            layer.push(blake2b(&leaf));
        }
        if layer.is_empty() {
            return Ok(TrieRoot::EMPTY);
        }
        while layer.len() > 1 {
            let mut next = Vec::with_capacity(layer.len().div_ceil(2));
            for pair in layer.chunks(2) {
                match pair {
                    [left, right] => {
                        let mut node = [0u8; 64];
                        node[..32].copy_from_slice(left);
                        node[32..].copy_from_slice(right);
                        next.push(blake2b(&node));
                    }
                    [odd] => next.push(*odd),
                    _ => unreachable!(),
                }
            }
            layer = next;
        }
        Ok(TrieRoot(layer[0]))
    }
}
