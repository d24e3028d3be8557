//! Connect and disconnect covenant transitions for one transaction.
//!
//! The connect path walks inputs in natural order, then outputs in natural
//! order. The disconnect path is its exact inverse: outputs before inputs,
//! each in reverse index order. Deviating from this order breaks the
//! rollback invariant.

use heed::RoTxn;

use crate::{
    state::{error, ChainView, Error, Phase, State, View},
    types::{
        hashes::blake2b, is_name_valid, BlockHash, Covenant, CovenantKind,
        FilledTransaction, NameHash, OutPoint, Params, MAX_RECORD_SIZE,
    },
};

fn illegal(prev: CovenantKind, next: Option<CovenantKind>) -> Error {
    error::Covenant::IllegalTransition { prev, next }.into()
}

/// A renewal reference is accepted iff the block exists, lies on the main
/// chain, is mature, and is no older than the renewal period.
fn check_renewal(
    chain: &impl ChainView,
    block_hash: &BlockHash,
    height: u32,
    params: &Params,
) -> Result<(), Error> {
    let Some(entry) = chain.try_get_entry(block_hash) else {
        return Err(error::Covenant::RenewalUnknownBlock {
            block_hash: *block_hash,
        }
        .into());
    };
    if !chain.is_main_chain(&entry) {
        return Err(error::Covenant::RenewalNotMainChain {
            block_hash: *block_hash,
        }
        .into());
    }
    if entry.height > height.saturating_sub(params.coinbase_maturity) {
        return Err(error::Covenant::RenewalImmature {
            block_hash: *block_hash,
        }
        .into());
    }
    if entry.height < height.saturating_sub(params.renewal_period) {
        return Err(error::Covenant::RenewalTooOld {
            block_hash: *block_hash,
        }
        .into());
    }
    Ok(())
}

/// Apply the covenant transitions of one transaction at `height`.
///
/// Every mutation lands in the view's op logs; an error leaves the store
/// untouched and rejects the enclosing block.
pub fn connect_covenants(
    state: &State,
    rotxn: &RoTxn,
    view: &mut View,
    chain: &impl ChainView,
    tx: &FilledTransaction,
    height: u32,
    params: &Params,
) -> Result<(), Error> {
    let txid = tx.txid();

    // inputs: validate each prior covenant against the output at the same
    // index and stage the transition
    for (vin, input) in tx.inputs().iter().enumerate() {
        let spent = tx
            .spent_outputs
            .get(vin)
            .ok_or(Error::MissingSpentOutput { index: vin })?;
        let output = tx.outputs().get(vin);
        let outpoint = OutPoint::new(txid, vin as u32);
        match &spent.covenant {
            // terminal covenants: the coin is ordinary value from here on
            Covenant::None
            | Covenant::Redeem { .. }
            | Covenant::Release { .. } => continue,
            Covenant::Bid { .. } => {
                let Some(output) = output else {
                    return Err(illegal(CovenantKind::Bid, None));
                };
                let Covenant::Reveal { .. } = &output.covenant else {
                    return Err(illegal(
                        CovenantKind::Bid,
                        Some(output.covenant.kind()),
                    ));
                };
                let Some(auction) =
                    view.get_auction_for(state, rotxn, *input)?
                else {
                    return Err(Error::NoAuctionForOutpoint {
                        outpoint: *input,
                    });
                };
                let found = auction.phase(height, params);
                if found == Phase::Closed {
                    return Err(error::Covenant::WrongPhase {
                        name_hash: auction.name_hash,
                        expected: Phase::Reveal,
                        found,
                    }
                    .into());
                }
                auction.remove_bid(*input);
                auction.add_reveal(outpoint, output.value);
            }
            Covenant::Reveal { .. } => {
                let Some(output) = output else {
                    return Err(illegal(CovenantKind::Reveal, None));
                };
                let Some(auction) =
                    view.get_auction_for(state, rotxn, *input)?
                else {
                    return Err(Error::NoAuctionForOutpoint {
                        outpoint: *input,
                    });
                };
                let name_hash = auction.name_hash;
                let found = auction.phase(height, params);
                if found != Phase::Closed {
                    return Err(error::Covenant::WrongPhase {
                        name_hash,
                        expected: Phase::Closed,
                        found,
                    }
                    .into());
                }
                let winner = match auction.owner {
                    Some(owner) => Some(owner),
                    None => state.pick_winner(rotxn, &name_hash)?,
                };
                match &output.covenant {
                    Covenant::Redeem { .. } => {
                        if winner == Some(*input) {
                            return Err(error::Covenant::WinnerRedeem {
                                outpoint: *input,
                            }
                            .into());
                        }
                        auction.remove_reveal(*input);
                    }
                    Covenant::Update { data, renewal, .. } => {
                        if renewal.is_some() {
                            // only an established owner may renew
                            return Err(illegal(
                                CovenantKind::Reveal,
                                Some(CovenantKind::Update),
                            ));
                        }
                        if data.len() > MAX_RECORD_SIZE {
                            return Err(error::Covenant::RecordTooLarge {
                                max: MAX_RECORD_SIZE,
                            }
                            .into());
                        }
                        if winner != Some(*input) {
                            return Err(error::Covenant::NotWinner {
                                outpoint: *input,
                            }
                            .into());
                        }
                        auction.remove_reveal(*input);
                        auction.set_owner(outpoint);
                        auction.set_renewal(height);
                        auction.commit(blake2b(data));
                    }
                    Covenant::Transfer { .. } => {
                        if winner != Some(*input) {
                            return Err(error::Covenant::NotWinner {
                                outpoint: *input,
                            }
                            .into());
                        }
                        auction.remove_reveal(*input);
                        auction.set_owner(outpoint);
                        auction.set_renewal(height);
                    }
                    Covenant::Release { .. } => {
                        if winner != Some(*input) {
                            return Err(error::Covenant::NotWinner {
                                outpoint: *input,
                            }
                            .into());
                        }
                        auction.remove_reveal(*input);
                        auction.add_undo(*input);
                        auction.set_null();
                        tracing::debug!(
                            %name_hash, %height,
                            "name released from reveal"
                        );
                    }
                    other => {
                        return Err(illegal(
                            CovenantKind::Reveal,
                            Some(other.kind()),
                        ));
                    }
                }
            }
            Covenant::Update { name_hash, .. } => {
                let Some(output) = output else {
                    return Err(illegal(CovenantKind::Update, None));
                };
                let name_hash = *name_hash;
                let Some(auction) =
                    view.get_auction(state, rotxn, &name_hash)?
                else {
                    return Err(Error::MissingAuction { name_hash });
                };
                let found = auction.phase(height, params);
                if found != Phase::Closed {
                    return Err(error::Covenant::WrongPhase {
                        name_hash,
                        expected: Phase::Closed,
                        found,
                    }
                    .into());
                }
                if auction.owner != Some(*input) {
                    return Err(error::Covenant::NotOwner {
                        outpoint: *input,
                    }
                    .into());
                }
                match &output.covenant {
                    Covenant::Update { data, renewal, .. } => {
                        if data.len() > MAX_RECORD_SIZE {
                            return Err(error::Covenant::RecordTooLarge {
                                max: MAX_RECORD_SIZE,
                            }
                            .into());
                        }
                        auction.set_owner(outpoint);
                        auction.commit(blake2b(data));
                        if let Some(block_hash) = renewal {
                            check_renewal(chain, block_hash, height, params)?;
                            auction.add_renewal(*input, auction.renewal);
                            auction.set_renewal(height);
                            tracing::trace!(
                                %name_hash, %height,
                                "name renewed"
                            );
                        }
                    }
                    Covenant::Transfer { .. } => {
                        /* Unresolved upstream whether a transfer out of an
                         * update should reassign the owner; the record is
                         * left untouched. */
                    }
                    Covenant::Release { .. } => {
                        auction.add_undo(*input);
                        auction.set_null();
                        auction.uncommit();
                        tracing::debug!(%name_hash, %height, "name released");
                    }
                    other => {
                        return Err(illegal(
                            CovenantKind::Update,
                            Some(other.kind()),
                        ));
                    }
                }
            }
            Covenant::Transfer { name_hash } => {
                let Some(output) = output else {
                    return Err(illegal(CovenantKind::Transfer, None));
                };
                let name_hash = *name_hash;
                let Some(auction) =
                    view.get_auction(state, rotxn, &name_hash)?
                else {
                    return Err(Error::MissingAuction { name_hash });
                };
                let found = auction.phase(height, params);
                if found != Phase::Closed {
                    return Err(error::Covenant::WrongPhase {
                        name_hash,
                        expected: Phase::Closed,
                        found,
                    }
                    .into());
                }
                if auction.owner != Some(*input) {
                    return Err(error::Covenant::NotOwner {
                        outpoint: *input,
                    }
                    .into());
                }
                match &output.covenant {
                    Covenant::Update { data, renewal, .. } => {
                        if renewal.is_some() {
                            return Err(illegal(
                                CovenantKind::Transfer,
                                Some(CovenantKind::Update),
                            ));
                        }
                        if data.len() > MAX_RECORD_SIZE {
                            return Err(error::Covenant::RecordTooLarge {
                                max: MAX_RECORD_SIZE,
                            }
                            .into());
                        }
                        auction.set_owner(outpoint);
                        auction.commit(blake2b(data));
                    }
                    Covenant::Release { .. } => {
                        auction.add_undo(*input);
                        auction.set_null();
                        auction.uncommit();
                        tracing::debug!(%name_hash, %height, "name released");
                    }
                    other => {
                        return Err(illegal(
                            CovenantKind::Transfer,
                            Some(other.kind()),
                        ));
                    }
                }
            }
        }
    }

    // outputs: open auctions and record new bids
    for (vout, output) in tx.outputs().iter().enumerate() {
        let Covenant::Bid { name } = &output.covenant else {
            continue;
        };
        if !is_name_valid(name) {
            return Err(error::Covenant::InvalidName.into());
        }
        let name_hash = NameHash::of(name);
        if params.has_rollout() {
            let start = params.rollout_start(name_hash.0[0]);
            if height < start {
                return Err(error::Covenant::NotRolledOut {
                    name_hash,
                    height,
                    start,
                }
                .into());
            }
        }
        let outpoint = OutPoint::new(txid, vout as u32);
        let auction = view.ensure_auction(state, rotxn, name, height)?;
        if height >= auction.renewal.saturating_add(params.renewal_window) {
            // the epoch expired unrenewed: snapshot it, then reopen
            tracing::debug!(
                %name_hash, %height,
                "expired name, reopening auction"
            );
            auction.add_undo(OutPoint::undo(txid, vout as u32));
            auction.reset(height);
            auction.uncommit();
        }
        let found = auction.phase(height, params);
        if found != Phase::Bidding {
            return Err(error::Covenant::WrongPhase {
                name_hash,
                expected: Phase::Bidding,
                found,
            }
            .into());
        }
        auction.add_bid(outpoint);
    }
    Ok(())
}

/// Undo the covenant transitions of one transaction. Outputs are processed
/// before inputs, each list in reverse index order, so opcode stacks
/// balance; undo records written on connect are consumed here.
pub fn disconnect_covenants(
    state: &State,
    rotxn: &RoTxn,
    view: &mut View,
    tx: &FilledTransaction,
    height: u32,
) -> Result<(), Error> {
    let txid = tx.txid();
    tracing::trace!(%txid, %height, "disconnecting covenants");

    // outputs first: retract bids, restoring or deleting emptied auctions
    for (vout, output) in tx.outputs().iter().enumerate().rev() {
        let Covenant::Bid { name } = &output.covenant else {
            continue;
        };
        let name_hash = NameHash::of(name);
        let Some(auction) = view.get_auction(state, rotxn, &name_hash)? else {
            return Err(Error::MissingAuction { name_hash });
        };
        auction.remove_bid(OutPoint::new(txid, vout as u32));
        if auction.bids == 0 {
            let undo_key = OutPoint::undo(txid, vout as u32);
            match state.try_get_undo(rotxn, undo_key)? {
                // this bid reopened an expired epoch: bring the old one back
                Some(snapshot) => {
                    auction.remove_undo(undo_key);
                    auction.restore(snapshot);
                }
                // this bid created the auction
                None => auction.remove(),
            }
        }
    }

    // inputs: invert each transition of the connect table
    for (vin, input) in tx.inputs().iter().enumerate().rev() {
        let spent = tx
            .spent_outputs
            .get(vin)
            .ok_or(Error::MissingSpentOutput { index: vin })?;
        let outpoint = OutPoint::new(txid, vin as u32);
        let output = tx.outputs().get(vin);
        match &spent.covenant {
            Covenant::None
            | Covenant::Redeem { .. }
            | Covenant::Release { .. } => continue,
            Covenant::Bid { .. } => {
                let Some(auction) =
                    view.get_auction_for(state, rotxn, outpoint)?
                else {
                    return Err(Error::NoAuctionForOutpoint { outpoint });
                };
                auction.remove_reveal(outpoint);
                auction.add_bid(*input);
            }
            Covenant::Reveal { name_hash } => {
                let Some(output) = output else {
                    return Err(Error::InconsistentUndo { outpoint });
                };
                let name_hash = *name_hash;
                let Some(auction) =
                    view.get_auction(state, rotxn, &name_hash)?
                else {
                    return Err(Error::MissingAuction { name_hash });
                };
                match &output.covenant {
                    Covenant::Redeem { .. } => {
                        auction.add_reveal(*input, spent.value);
                    }
                    Covenant::Update { .. } => {
                        auction.uncommit();
                        auction.set_null();
                        auction.set_renewal(auction.height);
                        auction.add_reveal(*input, spent.value);
                    }
                    Covenant::Transfer { .. } => {
                        auction.set_null();
                        auction.set_renewal(auction.height);
                        auction.add_reveal(*input, spent.value);
                    }
                    Covenant::Release { .. } => {
                        let snapshot = state
                            .try_get_undo(rotxn, *input)?
                            .ok_or(Error::MissingUndo {
                                outpoint: *input,
                            })?;
                        auction.remove_undo(*input);
                        auction.restore(snapshot);
                        auction.add_reveal(*input, spent.value);
                    }
                    _ => {
                        return Err(Error::InconsistentUndo { outpoint });
                    }
                }
            }
            Covenant::Update {
                name_hash, data, ..
            } => {
                let Some(output) = output else {
                    return Err(Error::InconsistentUndo { outpoint });
                };
                let name_hash = *name_hash;
                let Some(auction) =
                    view.get_auction(state, rotxn, &name_hash)?
                else {
                    return Err(Error::MissingAuction { name_hash });
                };
                match &output.covenant {
                    Covenant::Update { renewal, .. } => {
                        auction.set_owner(*input);
                        auction.commit(blake2b(data));
                        if renewal.is_some() {
                            let prior = state
                                .try_get_renewal_undo(rotxn, *input)?
                                .ok_or(Error::MissingRenewalUndo {
                                    outpoint: *input,
                                })?;
                            auction.set_renewal(prior);
                            auction.remove_renewal(*input);
                        }
                    }
                    Covenant::Transfer { .. } => {
                        // the forward transition was a no-op
                    }
                    Covenant::Release { .. } => {
                        let snapshot = state
                            .try_get_undo(rotxn, *input)?
                            .ok_or(Error::MissingUndo {
                                outpoint: *input,
                            })?;
                        auction.remove_undo(*input);
                        auction.restore(snapshot);
                    }
                    _ => {
                        return Err(Error::InconsistentUndo { outpoint });
                    }
                }
            }
            Covenant::Transfer { name_hash } => {
                let Some(output) = output else {
                    return Err(Error::InconsistentUndo { outpoint });
                };
                let name_hash = *name_hash;
                let Some(auction) =
                    view.get_auction(state, rotxn, &name_hash)?
                else {
                    return Err(Error::MissingAuction { name_hash });
                };
                match &output.covenant {
                    Covenant::Update { .. } => {
                        auction.set_owner(*input);
                        auction.uncommit();
                    }
                    Covenant::Release { .. } => {
                        let snapshot = state
                            .try_get_undo(rotxn, *input)?
                            .ok_or(Error::MissingUndo {
                                outpoint: *input,
                            })?;
                        auction.remove_undo(*input);
                        auction.restore(snapshot);
                    }
                    _ => {
                        return Err(Error::InconsistentUndo { outpoint });
                    }
                }
            }
        }
    }
    Ok(())
}
