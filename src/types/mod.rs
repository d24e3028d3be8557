pub mod hashes;
pub mod params;
mod transaction;

pub use hashes::{BlockHash, Hash, NameHash, TrieRoot, Txid};
pub use params::{Network, Params};
pub use transaction::{
    Covenant, CovenantKind, FilledTransaction, Output, Transaction,
};
pub use transaction::{OutPoint, OUTPOINT_KEY_LEN};

/// Longest name accepted by a BID covenant, in bytes.
pub const MAX_NAME_SIZE: usize = 63;

/// Longest record accepted by an UPDATE covenant, in bytes.
pub const MAX_RECORD_SIZE: usize = 512;

/// Check that a name is auctionable: non-empty ASCII from `[a-z0-9-]`,
/// at most [`MAX_NAME_SIZE`] bytes, no leading or trailing hyphen.
pub fn is_name_valid(name: &[u8]) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_SIZE {
        return false;
    }
    if name[0] == b'-' || name[name.len() - 1] == b'-' {
        return false;
    }
    name.iter()
        .all(|byte| matches!(byte, b'a'..=b'z' | b'0'..=b'9' | b'-'))
}

/// (de)serialize as hex strings for human-readable forms like json,
/// and default serialization for non human-readable formats like bincode
mod serde_hexstr_human_readable {
    use hex::{FromHex, ToHex};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(data: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize + ToHex,
    {
        if serializer.is_human_readable() {
            hex::serde::serialize(data, serializer)
        } else {
            data.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromHex,
        <T as FromHex>::Error: std::fmt::Display,
    {
        if deserializer.is_human_readable() {
            hex::serde::deserialize(deserializer)
        } else {
            T::deserialize(deserializer)
        }
    }
}
