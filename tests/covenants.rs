//! End-to-end covenant flows: auctions driven block by block through the
//! connect and disconnect engines against a throwaway LMDB environment.

use std::collections::HashMap;

use proptest::prelude::*;

use namestate::{
    state::{
        block, error::Covenant as CovenantError, ChainEntry, ChainView,
        Error, Phase, State, StateDump,
    },
    types::{
        hashes::blake2b, BlockHash, Covenant, FilledTransaction, NameHash,
        Network, OutPoint, Output, Params, Transaction, TrieRoot,
    },
};

#[derive(Default)]
struct TestChain {
    entries: HashMap<BlockHash, (u32, bool)>,
}

impl TestChain {
    fn insert(&mut self, hash: BlockHash, height: u32, main: bool) {
        self.entries.insert(hash, (height, main));
    }
}

impl ChainView for TestChain {
    fn try_get_entry(&self, block_hash: &BlockHash) -> Option<ChainEntry> {
        self.entries.get(block_hash).map(|(height, _)| ChainEntry {
            hash: *block_hash,
            height: *height,
        })
    }

    fn is_main_chain(&self, entry: &ChainEntry) -> bool {
        self.entries
            .get(&entry.hash)
            .is_some_and(|(_, main)| *main)
    }
}

struct Harness {
    env: heed::Env,
    state: State,
    params: Params,
    chain: TestChain,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(params: Params) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let env = unsafe {
            heed::EnvOpenOptions::new()
                .map_size(64 * 1024 * 1024)
                .max_dbs(State::NUM_DBS)
                .open(dir.path())
                .unwrap()
        };
        let state = State::new(&env).unwrap();
        Self {
            env,
            state,
            params,
            chain: TestChain::default(),
            _dir: dir,
        }
    }

    /// Connect a block, learning the committed root the way a validator
    /// would: apply against a throwaway write transaction, recompute, then
    /// connect for real against the recomputed root.
    fn try_connect(
        &self,
        txs: &[FilledTransaction],
        height: u32,
    ) -> Result<TrieRoot, Error> {
        let computed = {
            let mut rwtxn = self.env.write_txn().unwrap();
            let result = block::connect(
                &self.state,
                &mut rwtxn,
                &self.chain,
                txs,
                height,
                &self.params,
                &TrieRoot::EMPTY,
            );
            drop(rwtxn);
            match result {
                Ok(root) => root,
                Err(Error::RootMismatch { computed, .. }) => computed,
                Err(err) => return Err(err),
            }
        };
        let mut rwtxn = self.env.write_txn().unwrap();
        let root = block::connect(
            &self.state,
            &mut rwtxn,
            &self.chain,
            txs,
            height,
            &self.params,
            &computed,
        )?;
        rwtxn.commit().unwrap();
        Ok(root)
    }

    fn connect(&self, txs: &[FilledTransaction], height: u32) -> TrieRoot {
        self.try_connect(txs, height).expect("block should connect")
    }

    fn connect_err(&self, txs: &[FilledTransaction], height: u32) -> Error {
        self.try_connect(txs, height)
            .expect_err("block should be rejected")
    }

    fn disconnect(&self, txs: &[FilledTransaction], height: u32) -> TrieRoot {
        let mut rwtxn = self.env.write_txn().unwrap();
        let root = block::disconnect(&self.state, &mut rwtxn, txs, height)
            .expect("block should disconnect");
        rwtxn.commit().unwrap();
        root
    }

    fn dump(&self) -> StateDump {
        let rotxn = self.env.read_txn().unwrap();
        self.state.dump(&rotxn).unwrap()
    }
}

fn filled(
    inputs: Vec<(OutPoint, Output)>,
    outputs: Vec<Output>,
) -> FilledTransaction {
    FilledTransaction {
        transaction: Transaction {
            inputs: inputs.iter().map(|(outpoint, _)| *outpoint).collect(),
            outputs,
        },
        spent_outputs: inputs.into_iter().map(|(_, output)| output).collect(),
    }
}

fn spend(tx: &FilledTransaction, vout: u32) -> (OutPoint, Output) {
    (
        OutPoint::new(tx.txid(), vout),
        tx.outputs()[vout as usize].clone(),
    )
}

fn bid(name: &str, value: u64) -> Output {
    Output {
        value,
        covenant: Covenant::Bid {
            name: name.as_bytes().to_vec(),
        },
    }
}

fn reveal(name: &str, value: u64) -> Output {
    Output {
        value,
        covenant: Covenant::Reveal {
            name_hash: NameHash::of(name.as_bytes()),
        },
    }
}

fn redeem(name: &str, value: u64) -> Output {
    Output {
        value,
        covenant: Covenant::Redeem {
            name_hash: NameHash::of(name.as_bytes()),
        },
    }
}

fn update(
    name: &str,
    data: &[u8],
    renewal: Option<BlockHash>,
    value: u64,
) -> Output {
    Output {
        value,
        covenant: Covenant::Update {
            name_hash: NameHash::of(name.as_bytes()),
            data: data.to_vec(),
            renewal,
        },
    }
}

fn transfer(name: &str, value: u64) -> Output {
    Output {
        value,
        covenant: Covenant::Transfer {
            name_hash: NameHash::of(name.as_bytes()),
        },
    }
}

fn release(name: &str, value: u64) -> Output {
    Output {
        value,
        covenant: Covenant::Release {
            name_hash: NameHash::of(name.as_bytes()),
        },
    }
}

fn plain(value: u64) -> Output {
    Output {
        value,
        covenant: Covenant::None,
    }
}

/// Check both directions of the reverse-index bijection for the given names.
fn assert_reverse_index_bijection(h: &Harness, names: &[NameHash]) {
    let rotxn = h.env.read_txn().unwrap();
    let mut n_records = 0u64;
    for name_hash in names {
        for outpoint in h.state.bids_for(&rotxn, name_hash).unwrap() {
            assert_eq!(
                h.state.try_get_name_for(&rotxn, outpoint).unwrap(),
                Some(*name_hash)
            );
            n_records += 1;
        }
        for (outpoint, _) in h.state.reveals_for(&rotxn, name_hash).unwrap() {
            assert_eq!(
                h.state.try_get_name_for(&rotxn, outpoint).unwrap(),
                Some(*name_hash)
            );
            n_records += 1;
        }
    }
    assert_eq!(h.state.name_index_count(&rotxn).unwrap(), n_records);
}

/// Bid at 10, reveal at 15, update at 25: leaves "alice" owned with record
/// "v1" committed. Returns the update transaction.
fn establish_owner(h: &Harness) -> (FilledTransaction, NameHash) {
    let name_hash = NameHash::of(b"alice");
    let tx_bid = filled(vec![], vec![bid("alice", 1_000)]);
    h.connect(&[tx_bid.clone()], 10);
    let tx_reveal = filled(vec![spend(&tx_bid, 0)], vec![reveal("alice", 1_000)]);
    h.connect(&[tx_reveal.clone()], 15);
    let tx_update = filled(
        vec![spend(&tx_reveal, 0)],
        vec![update("alice", b"v1", None, 1_000)],
    );
    h.connect(&[tx_update.clone()], 25);
    (tx_update, name_hash)
}

#[test]
fn happy_path_bid_reveal_update() {
    let h = Harness::new(Params::regtest());
    let name_hash = NameHash::of(b"alice");

    let tx_bid = filled(vec![], vec![bid("alice", 1_000)]);
    h.connect(&[tx_bid.clone()], 10);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.bids, 1);
        assert_eq!(auction.height, 10);
        assert_eq!(auction.phase(10, &h.params), Phase::Bidding);
        assert_eq!(
            h.state.bids_for(&rotxn, &name_hash).unwrap(),
            vec![OutPoint::new(tx_bid.txid(), 0)]
        );
    }
    assert_reverse_index_bijection(&h, &[name_hash]);

    let tx_reveal =
        filled(vec![spend(&tx_bid, 0)], vec![reveal("alice", 1_000)]);
    h.connect(&[tx_reveal.clone()], 15);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.bids, 0);
        assert_eq!(
            h.state.reveals_for(&rotxn, &name_hash).unwrap(),
            vec![(OutPoint::new(tx_reveal.txid(), 0), 1_000)]
        );
    }
    assert_reverse_index_bijection(&h, &[name_hash]);

    let tx_update = filled(
        vec![spend(&tx_reveal, 0)],
        vec![update("alice", b"v1", None, 1_000)],
    );
    let root = h.connect(&[tx_update.clone()], 25);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.owner, Some(OutPoint::new(tx_update.txid(), 0)));
        assert_eq!(auction.renewal, 25);
        assert_eq!(auction.data, Some(blake2b(b"v1")));
        assert_eq!(
            h.state.try_get_trie_record(&rotxn, &name_hash).unwrap(),
            Some(blake2b(b"v1"))
        );
        // the connected root is the live root
        assert_eq!(h.state.trie_root(&rotxn).unwrap(), root);
        assert_ne!(root, TrieRoot::EMPTY);
        assert_eq!(h.state.reveal_count(&rotxn).unwrap(), 0);
    }
    assert_reverse_index_bijection(&h, &[name_hash]);
}

#[test]
fn losing_bid_is_redeemed_without_ownership_change() {
    let h = Harness::new(Params::regtest());
    let name_hash = NameHash::of(b"alice");

    let tx_bid = filled(vec![], vec![bid("alice", 1_000), bid("alice", 500)]);
    h.connect(&[tx_bid.clone()], 10);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.bids, 2);
        assert_eq!(
            auction.bids as usize,
            h.state.bids_for(&rotxn, &name_hash).unwrap().len()
        );
    }

    let tx_reveal = filled(
        vec![spend(&tx_bid, 0), spend(&tx_bid, 1)],
        vec![reveal("alice", 1_000), reveal("alice", 500)],
    );
    h.connect(&[tx_reveal.clone()], 15);
    {
        let rotxn = h.env.read_txn().unwrap();
        assert_eq!(
            h.state.pick_winner(&rotxn, &name_hash).unwrap(),
            Some(OutPoint::new(tx_reveal.txid(), 0))
        );
    }

    let tx_redeem =
        filled(vec![spend(&tx_reveal, 1)], vec![redeem("alice", 500)]);
    let tx_update = filled(
        vec![spend(&tx_reveal, 0)],
        vec![update("alice", b"v1", None, 1_000)],
    );
    h.connect(&[tx_redeem.clone(), tx_update.clone()], 25);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.owner, Some(OutPoint::new(tx_update.txid(), 0)));
        assert_eq!(h.state.reveal_count(&rotxn).unwrap(), 0);
    }
    assert_reverse_index_bijection(&h, &[name_hash]);

    // a redeemed coin is ordinary value and spends freely
    let tx_spend = filled(vec![spend(&tx_redeem, 0)], vec![plain(500)]);
    h.connect(&[tx_spend], 26);
}

#[test]
fn winner_cannot_redeem_and_loser_cannot_update() {
    let h = Harness::new(Params::regtest());

    let tx_bid = filled(vec![], vec![bid("alice", 1_000), bid("alice", 500)]);
    h.connect(&[tx_bid.clone()], 10);
    let tx_reveal = filled(
        vec![spend(&tx_bid, 0), spend(&tx_bid, 1)],
        vec![reveal("alice", 1_000), reveal("alice", 500)],
    );
    h.connect(&[tx_reveal.clone()], 15);

    let tx_bad_redeem =
        filled(vec![spend(&tx_reveal, 0)], vec![redeem("alice", 1_000)]);
    assert!(matches!(
        h.connect_err(&[tx_bad_redeem], 25),
        Error::Covenant(CovenantError::WinnerRedeem { .. })
    ));

    let tx_bad_update = filled(
        vec![spend(&tx_reveal, 1)],
        vec![update("alice", b"v1", None, 500)],
    );
    assert!(matches!(
        h.connect_err(&[tx_bad_update], 25),
        Error::Covenant(CovenantError::NotWinner { .. })
    ));
}

#[test]
fn renewal_records_prior_height_and_disconnects() {
    let mut h = Harness::new(Params::regtest());
    let anchor = BlockHash([0x30; 32]);
    h.chain.insert(anchor, 30, true);
    let (tx_update, name_hash) = establish_owner(&h);
    let before = h.dump();

    let tx_renew = filled(
        vec![spend(&tx_update, 0)],
        vec![update("alice", b"v2", Some(anchor), 1_000)],
    );
    h.connect(&[tx_renew.clone()], 35);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.renewal, 35);
        assert_eq!(auction.owner, Some(OutPoint::new(tx_renew.txid(), 0)));
        assert_eq!(
            h.state
                .try_get_renewal_undo(
                    &rotxn,
                    OutPoint::new(tx_update.txid(), 0)
                )
                .unwrap(),
            Some(25)
        );
        assert_eq!(
            h.state.try_get_trie_record(&rotxn, &name_hash).unwrap(),
            Some(blake2b(b"v2"))
        );
    }

    h.disconnect(&[tx_renew], 35);
    assert_eq!(h.dump(), before);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.renewal, 25);
        assert_eq!(auction.owner, Some(OutPoint::new(tx_update.txid(), 0)));
        assert_eq!(
            h.state.try_get_trie_record(&rotxn, &name_hash).unwrap(),
            Some(blake2b(b"v1"))
        );
    }
}

#[test]
fn renewal_reference_boundaries() {
    let mut h = Harness::new(Params::regtest());
    let (tx_update, _) = establish_owner(&h);

    let unknown = BlockHash([0xaa; 32]);
    let side = BlockHash([0xbb; 32]);
    let immature = BlockHash([0xcc; 32]);
    let too_old = BlockHash([0xdd; 32]);
    let mature_exact = BlockHash([0xee; 32]);
    h.chain.insert(side, 30, false);
    h.chain.insert(immature, 34, true);
    h.chain.insert(too_old, 29, true);
    h.chain.insert(mature_exact, 33, true);

    let renew_against = |anchor: BlockHash| {
        filled(
            vec![spend(&tx_update, 0)],
            vec![update("alice", b"v2", Some(anchor), 1_000)],
        )
    };

    assert!(matches!(
        h.connect_err(&[renew_against(unknown)], 35),
        Error::Covenant(CovenantError::RenewalUnknownBlock { .. })
    ));
    assert!(matches!(
        h.connect_err(&[renew_against(side)], 35),
        Error::Covenant(CovenantError::RenewalNotMainChain { .. })
    ));
    // maturity boundary: height 34 at 35 is one block short
    assert!(matches!(
        h.connect_err(&[renew_against(immature)], 35),
        Error::Covenant(CovenantError::RenewalImmature { .. })
    ));
    // period boundary: height 29 at 80 is one block past the window
    assert!(matches!(
        h.connect_err(&[renew_against(too_old)], 80),
        Error::Covenant(CovenantError::RenewalTooOld { .. })
    ));
    // height 33 at 35 is exactly mature
    h.connect(&[renew_against(mature_exact)], 35);

    // and exactly renewal_period old is still accepted
    let tx_renew = renew_against(mature_exact);
    let old_exact = BlockHash([0x55; 32]);
    h.chain.insert(old_exact, 55, true);
    let tx_again = filled(
        vec![spend(&tx_renew, 0)],
        vec![update("alice", b"v3", Some(old_exact), 1_000)],
    );
    h.connect(&[tx_again], 105);
    let rotxn = h.env.read_txn().unwrap();
    let auction = h
        .state
        .get_auction(&rotxn, &NameHash::of(b"alice"))
        .unwrap();
    assert_eq!(auction.renewal, 105);
    assert_eq!(
        h.state
            .try_get_renewal_undo(&rotxn, OutPoint::new(tx_renew.txid(), 0))
            .unwrap(),
        Some(35)
    );
}

#[test]
fn expired_name_reopens_and_rolls_back() {
    let h = Harness::new(Params::regtest());
    let (tx_update, name_hash) = establish_owner(&h);

    // one block before the renewal window closes the name is still taken
    let tx_early = filled(vec![], vec![bid("alice", 2_000)]);
    assert!(matches!(
        h.connect_err(&[tx_early], 124),
        Error::Covenant(CovenantError::WrongPhase { .. })
    ));

    let before = h.dump();
    let tx_rebid = filled(vec![], vec![bid("alice", 2_000)]);
    h.connect(&[tx_rebid.clone()], 125);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.owner, None);
        assert_eq!(auction.height, 125);
        assert_eq!(auction.renewal, 125);
        assert_eq!(auction.bids, 1);
        assert_eq!(auction.phase(125, &h.params), Phase::Bidding);
        assert!(h
            .state
            .try_get_undo(&rotxn, OutPoint::undo(tx_rebid.txid(), 0))
            .unwrap()
            .is_some());
        assert_eq!(
            h.state.try_get_trie_record(&rotxn, &name_hash).unwrap(),
            None
        );
    }

    h.disconnect(&[tx_rebid], 125);
    assert_eq!(h.dump(), before);
    let rotxn = h.env.read_txn().unwrap();
    let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
    assert_eq!(auction.owner, Some(OutPoint::new(tx_update.txid(), 0)));
    assert_eq!(
        h.state.try_get_trie_record(&rotxn, &name_hash).unwrap(),
        Some(blake2b(b"v1"))
    );
}

#[test]
fn release_clears_ownership_and_rolls_back() {
    let h = Harness::new(Params::regtest());
    let (tx_update, name_hash) = establish_owner(&h);
    let before = h.dump();

    let tx_release =
        filled(vec![spend(&tx_update, 0)], vec![release("alice", 1_000)]);
    h.connect(&[tx_release.clone()], 30);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.owner, None);
        assert_eq!(auction.data, None);
        assert_eq!(
            h.state.try_get_trie_record(&rotxn, &name_hash).unwrap(),
            None
        );
        assert_eq!(h.state.trie_root(&rotxn).unwrap(), TrieRoot::EMPTY);
        let undo = h
            .state
            .try_get_undo(&rotxn, OutPoint::new(tx_update.txid(), 0))
            .unwrap()
            .expect("release should store an undo snapshot");
        assert_eq!(undo.owner, Some(OutPoint::new(tx_update.txid(), 0)));
        assert_eq!(undo.data, Some(blake2b(b"v1")));
    }

    h.disconnect(&[tx_release], 30);
    assert_eq!(h.dump(), before);
}

#[test]
fn reorg_unwinds_to_an_empty_state() {
    let mut h = Harness::new(Params::regtest());
    let anchor = BlockHash([0x30; 32]);
    h.chain.insert(anchor, 30, true);
    let name_hash = NameHash::of(b"alice");

    let dump0 = h.dump();
    assert!(dump0.is_empty());

    let tx_bid = filled(vec![], vec![bid("alice", 1_000)]);
    h.connect(&[tx_bid.clone()], 10);
    let dump1 = h.dump();

    let tx_reveal =
        filled(vec![spend(&tx_bid, 0)], vec![reveal("alice", 1_000)]);
    h.connect(&[tx_reveal.clone()], 15);
    let dump2 = h.dump();

    let tx_update = filled(
        vec![spend(&tx_reveal, 0)],
        vec![update("alice", b"v1", None, 1_000)],
    );
    h.connect(&[tx_update.clone()], 25);
    let dump3 = h.dump();

    let tx_renew = filled(
        vec![spend(&tx_update, 0)],
        vec![update("alice", b"v2", Some(anchor), 1_000)],
    );
    h.connect(&[tx_renew.clone()], 35);

    h.disconnect(&[tx_renew], 35);
    assert_eq!(h.dump(), dump3);
    h.disconnect(&[tx_update], 25);
    assert_eq!(h.dump(), dump2);
    h.disconnect(&[tx_reveal], 15);
    assert_eq!(h.dump(), dump1);
    let root = h.disconnect(&[tx_bid], 10);
    assert_eq!(h.dump(), dump0);

    let rotxn = h.env.read_txn().unwrap();
    assert_eq!(root, TrieRoot::EMPTY);
    assert_eq!(h.state.try_get_auction(&rotxn, &name_hash).unwrap(), None);
    assert_eq!(h.state.auction_count(&rotxn).unwrap(), 0);
    assert_eq!(h.state.bid_count(&rotxn).unwrap(), 0);
    assert_eq!(h.state.reveal_count(&rotxn).unwrap(), 0);
    assert_eq!(h.state.name_index_count(&rotxn).unwrap(), 0);
    assert_eq!(h.state.undo_count(&rotxn).unwrap(), 0);
    assert_eq!(h.state.renewal_undo_count(&rotxn).unwrap(), 0);
    assert_eq!(h.state.trie_record_count(&rotxn).unwrap(), 0);
}

#[test]
fn bid_and_reveal_chain_within_one_block() {
    let h = Harness::new(Params::regtest());
    let name_hash = NameHash::of(b"alice");

    let tx_bid = filled(vec![], vec![bid("alice", 1_000)]);
    let tx_reveal =
        filled(vec![spend(&tx_bid, 0)], vec![reveal("alice", 1_000)]);
    let before = h.dump();
    h.connect(&[tx_bid.clone(), tx_reveal.clone()], 10);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.bids, 0);
        assert_eq!(
            h.state.reveals_for(&rotxn, &name_hash).unwrap(),
            vec![(OutPoint::new(tx_reveal.txid(), 0), 1_000)]
        );
    }
    assert_reverse_index_bijection(&h, &[name_hash]);

    h.disconnect(&[tx_bid, tx_reveal], 10);
    assert_eq!(h.dump(), before);
}

#[test]
fn transfer_from_reveal_takes_ownership() {
    let h = Harness::new(Params::regtest());
    let name_hash = NameHash::of(b"alice");

    let tx_bid = filled(vec![], vec![bid("alice", 1_000)]);
    h.connect(&[tx_bid.clone()], 10);
    let tx_reveal =
        filled(vec![spend(&tx_bid, 0)], vec![reveal("alice", 1_000)]);
    h.connect(&[tx_reveal.clone()], 15);

    let tx_transfer =
        filled(vec![spend(&tx_reveal, 0)], vec![transfer("alice", 1_000)]);
    let before = h.dump();
    h.connect(&[tx_transfer.clone()], 25);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(
            auction.owner,
            Some(OutPoint::new(tx_transfer.txid(), 0))
        );
        // a transfer commits nothing
        assert_eq!(
            h.state.try_get_trie_record(&rotxn, &name_hash).unwrap(),
            None
        );
    }

    let tx_update = filled(
        vec![spend(&tx_transfer, 0)],
        vec![update("alice", b"v1", None, 1_000)],
    );
    h.connect(&[tx_update.clone()], 26);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.owner, Some(OutPoint::new(tx_update.txid(), 0)));
        assert_eq!(
            h.state.try_get_trie_record(&rotxn, &name_hash).unwrap(),
            Some(blake2b(b"v1"))
        );
    }

    h.disconnect(&[tx_update], 26);
    h.disconnect(&[tx_transfer], 25);
    assert_eq!(h.dump(), before);
}

/// Upstream leaves TRANSFER-out-of-UPDATE semantics unresolved: the
/// transition is accepted but changes nothing, so the transferred output
/// never becomes owner and cannot update.
#[test]
fn transfer_from_update_leaves_owner_unchanged() {
    let h = Harness::new(Params::regtest());
    let (tx_update, name_hash) = establish_owner(&h);
    let owner = OutPoint::new(tx_update.txid(), 0);
    let before = h.dump();

    let tx_transfer =
        filled(vec![spend(&tx_update, 0)], vec![transfer("alice", 1_000)]);
    h.connect(&[tx_transfer.clone()], 30);
    {
        let rotxn = h.env.read_txn().unwrap();
        let auction = h.state.get_auction(&rotxn, &name_hash).unwrap();
        assert_eq!(auction.owner, Some(owner));
        assert_eq!(
            h.state.try_get_trie_record(&rotxn, &name_hash).unwrap(),
            Some(blake2b(b"v1"))
        );
    }

    let tx_bad = filled(
        vec![spend(&tx_transfer, 0)],
        vec![update("alice", b"v2", None, 1_000)],
    );
    assert!(matches!(
        h.connect_err(&[tx_bad], 31),
        Error::Covenant(CovenantError::NotOwner { .. })
    ));

    h.disconnect(&[tx_transfer], 30);
    assert_eq!(h.dump(), before);
}

#[test]
fn illegal_transitions_reject_the_block() {
    let h = Harness::new(Params::regtest());
    let tx_bid = filled(vec![], vec![bid("alice", 1_000)]);
    h.connect(&[tx_bid.clone()], 10);

    // a bid must be revealed, not updated
    let tx_bad = filled(
        vec![spend(&tx_bid, 0)],
        vec![update("alice", b"v1", None, 1_000)],
    );
    let err = h.connect_err(&[tx_bad], 15);
    assert!(err.is_consensus());
    assert!(matches!(
        err,
        Error::Covenant(CovenantError::IllegalTransition { .. })
    ));

    // and needs a matching output
    let tx_missing = filled(vec![spend(&tx_bid, 0)], vec![]);
    assert!(matches!(
        h.connect_err(&[tx_missing], 15),
        Error::Covenant(CovenantError::IllegalTransition { .. })
    ));
}

#[test]
fn phase_violations_reject_the_block() {
    let h = Harness::new(Params::regtest());
    let tx_bid = filled(vec![], vec![bid("alice", 1_000)]);
    h.connect(&[tx_bid.clone()], 10);

    // a second bid after the bidding period
    let tx_late_bid = filled(vec![], vec![bid("alice", 2_000)]);
    assert!(matches!(
        h.connect_err(&[tx_late_bid], 15),
        Error::Covenant(CovenantError::WrongPhase { .. })
    ));

    // a reveal after the reveal period
    let tx_late_reveal =
        filled(vec![spend(&tx_bid, 0)], vec![reveal("alice", 1_000)]);
    assert!(matches!(
        h.connect_err(&[tx_late_reveal.clone()], 25),
        Error::Covenant(CovenantError::WrongPhase { .. })
    ));

    // an update before the auction closes
    h.connect(&[tx_late_reveal.clone()], 15);
    let tx_early_update = filled(
        vec![spend(&tx_late_reveal, 0)],
        vec![update("alice", b"v1", None, 1_000)],
    );
    assert!(matches!(
        h.connect_err(&[tx_early_update], 20),
        Error::Covenant(CovenantError::WrongPhase { .. })
    ));
}

#[test]
fn invalid_names_and_oversized_records_are_rejected() {
    let h = Harness::new(Params::regtest());

    let tx_bad_name = filled(vec![], vec![bid("Alice", 1_000)]);
    assert!(matches!(
        h.connect_err(&[tx_bad_name], 10),
        Error::Covenant(CovenantError::InvalidName)
    ));

    let (tx_update, _) = establish_owner(&h);
    let big = vec![0u8; 513];
    let tx_big = filled(
        vec![spend(&tx_update, 0)],
        vec![update("alice", &big, None, 1_000)],
    );
    assert!(matches!(
        h.connect_err(&[tx_big], 30),
        Error::Covenant(CovenantError::RecordTooLarge { .. })
    ));
}

fn main_params() -> Params {
    Params {
        network: Network::Main,
        ..Params::regtest()
    }
}

#[test]
fn rollout_gate_boundary() {
    // find a name whose rollout slot is nonzero
    let params = main_params();
    let (name, start) = (0u32..)
        .map(|i| {
            let name = format!("name{i}");
            let start =
                params.rollout_start(NameHash::of(name.as_bytes()).0[0]);
            (name, start)
        })
        .find(|(_, start)| *start > 0)
        .unwrap();

    let h = Harness::new(params);
    let tx = filled(vec![], vec![bid(&name, 1_000)]);
    assert!(matches!(
        h.connect_err(&[tx.clone()], start - 1),
        Error::Covenant(CovenantError::NotRolledOut { .. })
    ));
    // a bid at exactly the rollout height succeeds
    h.connect(&[tx], start);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn rollout_gate_rejects_every_early_bid(name in "[a-z]{1,8}") {
        let params = main_params();
        let name_hash = NameHash::of(name.as_bytes());
        let start = params.rollout_start(name_hash.0[0]);
        prop_assume!(start > 0);

        let h = Harness::new(params);
        let tx = filled(vec![], vec![bid(&name, 1_000)]);
        let err = h.connect_err(&[tx.clone()], start - 1);
        let is_not_rolled_out = matches!(
            err,
            Error::Covenant(CovenantError::NotRolledOut { .. })
        );
        prop_assert!(is_not_rolled_out);
        h.connect(&[tx], start);
    }
}
