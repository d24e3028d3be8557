//! Chain-wide consensus parameters.

/// Number of weekly rollout slots a name hash can map to.
pub const ROLLOUT_SLOTS: u8 = 52;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    Main,
    Test,
    Regtest,
}

#[derive(Clone, Copy, Debug)]
pub struct Params {
    pub network: Network,
    /// Blocks during which sealed bids are accepted.
    pub bidding_period: u32,
    /// Blocks during which bids may be revealed.
    pub reveal_period: u32,
    /// Blocks per weekly rollout slot.
    pub rollout_interval: u32,
    /// Epoch duration before a name becomes re-auctionable.
    pub renewal_window: u32,
    /// Maximum age of a block referenced by a renewal.
    pub renewal_period: u32,
    /// Maturity depth required of a renewal reference.
    pub coinbase_maturity: u32,
}

impl Params {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Main,
            bidding_period: 720,
            reveal_period: 1_440,
            rollout_interval: 1_008,
            renewal_window: 52_560,
            renewal_period: 26_280,
            coinbase_maturity: 100,
        }
    }

    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            bidding_period: 5,
            reveal_period: 10,
            rollout_interval: 2,
            renewal_window: 100,
            renewal_period: 50,
            coinbase_maturity: 2,
        }
    }

    /// The rollout gate applies on the main network only.
    pub fn has_rollout(&self) -> bool {
        self.network == Network::Main
    }

    /// First height at which the name with the given leading hash byte may
    /// be bid on.
    pub fn rollout_start(&self, first_hash_byte: u8) -> u32 {
        u32::from(first_hash_byte % ROLLOUT_SLOTS) * self.rollout_interval
    }
}
