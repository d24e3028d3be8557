use crate::{
    state::auction::Phase,
    types::{BlockHash, CovenantKind, NameHash, OutPoint, TrieRoot},
};

/// Consensus failures: the block carrying the offending transaction is
/// rejected and never retried.
#[derive(Debug, thiserror::Error)]
pub enum Covenant {
    #[error("covenant transition {prev:?} -> {next:?} is not allowed")]
    IllegalTransition {
        prev: CovenantKind,
        next: Option<CovenantKind>,
    },
    #[error("invalid name for bid")]
    InvalidName,
    #[error("record exceeds {max} bytes")]
    RecordTooLarge { max: usize },
    #[error(
        "name {name_hash} rolls out at height {start}, bid at height {height}"
    )]
    NotRolledOut {
        name_hash: NameHash,
        height: u32,
        start: u32,
    },
    #[error("auction for {name_hash} is in phase {found:?}, expected {expected:?}")]
    WrongPhase {
        name_hash: NameHash,
        expected: Phase,
        found: Phase,
    },
    #[error("{outpoint} did not win the auction")]
    NotWinner { outpoint: OutPoint },
    #[error("{outpoint} does not own the name")]
    NotOwner { outpoint: OutPoint },
    #[error("the winning reveal {outpoint} cannot be redeemed")]
    WinnerRedeem { outpoint: OutPoint },
    #[error("renewal references unknown block {block_hash}")]
    RenewalUnknownBlock { block_hash: BlockHash },
    #[error("renewal references block {block_hash} off the main chain")]
    RenewalNotMainChain { block_hash: BlockHash },
    #[error("renewal reference {block_hash} is not yet mature")]
    RenewalImmature { block_hash: BlockHash },
    #[error("renewal reference {block_hash} is too old")]
    RenewalTooOld { block_hash: BlockHash },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Covenant(#[from] Covenant),
    #[error("heed error")]
    Heed(#[from] heed::Error),
    #[error("missing auction {name_hash}")]
    MissingAuction { name_hash: NameHash },
    #[error("no auction recorded for outpoint {outpoint}")]
    NoAuctionForOutpoint { outpoint: OutPoint },
    #[error("missing spent output for input {index}")]
    MissingSpentOutput { index: usize },
    #[error("missing undo record for {outpoint}")]
    MissingUndo { outpoint: OutPoint },
    #[error("missing renewal undo for {outpoint}")]
    MissingRenewalUndo { outpoint: OutPoint },
    #[error("missing {family} record for {outpoint}")]
    MissingRecord {
        family: &'static str,
        outpoint: OutPoint,
    },
    #[error("disconnect does not invert the recorded transition at {outpoint}")]
    InconsistentUndo { outpoint: OutPoint },
    #[error("trie root mismatch: header commits {expected}, computed {computed}")]
    RootMismatch {
        expected: TrieRoot,
        computed: TrieRoot,
    },
}

impl Error {
    /// Whether this error is a consensus rejection (as opposed to an
    /// internal fault such as a missing undo record or a storage failure).
    pub fn is_consensus(&self) -> bool {
        matches!(self, Self::Covenant(_) | Self::RootMismatch { .. })
    }
}
