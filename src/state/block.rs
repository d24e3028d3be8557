//! Connect and disconnect whole blocks of covenant transitions.

use heed::RwTxn;

use crate::{
    state::{covenants, ChainView, Error, State, View},
    types::{FilledTransaction, Params, TrieRoot},
};

/// Apply a block's transactions at `height` and flush the resulting view.
///
/// The recomputed trie root is compared against `committed_root` from the
/// block header only after the whole block has been applied. On any error
/// the caller must drop `rwtxn` uncommitted; nothing durable has happened
/// until it commits.
pub fn connect(
    state: &State,
    rwtxn: &mut RwTxn,
    chain: &impl ChainView,
    txs: &[FilledTransaction],
    height: u32,
    params: &Params,
    committed_root: &TrieRoot,
) -> Result<TrieRoot, Error> {
    tracing::trace!(%height, n_txs = txs.len(), "connecting covenants");
    let mut view = View::new();
    for tx in txs {
        covenants::connect_covenants(
            state, rwtxn, &mut view, chain, tx, height, params,
        )?;
    }
    state.save_view(rwtxn, view)?;
    let computed = state.trie_root(rwtxn)?;
    if computed != *committed_root {
        return Err(Error::RootMismatch {
            expected: *committed_root,
            computed,
        });
    }
    Ok(computed)
}

/// Undo a block's transactions, last-to-first, and flush the resulting
/// view. Returns the trie root after the rollback.
pub fn disconnect(
    state: &State,
    rwtxn: &mut RwTxn,
    txs: &[FilledTransaction],
    height: u32,
) -> Result<TrieRoot, Error> {
    tracing::trace!(%height, n_txs = txs.len(), "disconnecting covenants");
    let mut view = View::new();
    for tx in txs.iter().rev() {
        covenants::disconnect_covenants(state, rwtxn, &mut view, tx, height)?;
    }
    state.save_view(rwtxn, view)?;
    state.trie_root(rwtxn)
}
