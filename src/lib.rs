//! Name-auction state engine for a UTXO blockchain.
//!
//! Names are sold by first-price sealed-bid auction. Each transaction output
//! carries a covenant constraining how it may be spent; the engine validates
//! covenant transitions against the current auction phase, mutates per-name
//! auction state, and logs undo information so a block can be disconnected
//! bit-for-bit during a reorganization. Committed name records feed a trie
//! whose root is committed in block headers.
//!
//! The engine does not parse blocks, validate signatures, or track the UTXO
//! set; the validator supplies filled transactions and a [`state::ChainView`]
//! and owns the LMDB write transaction that makes a block's effects atomic.

pub mod state;
pub mod types;
