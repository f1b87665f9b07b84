//! Address derivation and EIP-55 checksum handling.

use std::str::FromStr;

use alloy::primitives::{keccak256, Address};

use crate::keys::derivation::PublicKey;
use crate::keys::{KeyError, KeyResult};

/// Last 20 bytes of keccak256 over the 64-byte public key (SEC1 prefix dropped).
pub fn derive_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.to_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// EIP-55 mixed-case form. All addresses leaving the crate go through this.
pub fn to_checksum(address: &Address) -> String {
    address.to_checksum(None)
}

/// Parse `0x` + 40 hex characters.
///
/// Single-case input is accepted as is; mixed-case input must carry a valid
/// EIP-55 checksum.
pub fn parse_address(input: &str) -> KeyResult<Address> {
    let invalid = |reason| KeyError::InvalidAddress {
        input: input.to_string(),
        reason,
    };

    let digits = input
        .strip_prefix("0x")
        .ok_or_else(|| invalid("missing 0x prefix"))?;

    if digits.len() != 40 {
        return Err(invalid("expected 40 hex characters"));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("non-hex character"));
    }

    let single_case = !digits.chars().any(|c| c.is_ascii_uppercase())
        || !digits.chars().any(|c| c.is_ascii_lowercase());

    if single_case {
        Address::from_str(input).map_err(|_| invalid("non-hex character"))
    } else {
        Address::parse_checksummed(input, None).map_err(|_| invalid("checksum mismatch"))
    }
}
