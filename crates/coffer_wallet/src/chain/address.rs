//! Address text handling on top of [`alloy_primitives::Address`].

use std::str::FromStr;

use alloy_primitives::Address;

use crate::error::ChainError;

/// Parse a `0x`-prefixed 20-byte hex address without checking its checksum.
///
/// Used for addresses that come from trusted lists or the node itself.
pub fn parse_address(address: &str) -> Result<Address, ChainError> {
    let invalid = || ChainError::InvalidAddress(address.to_string());
    let hex_part = address.strip_prefix("0x").ok_or_else(invalid)?;
    if hex_part.len() != 40 {
        return Err(invalid());
    }
    Address::from_str(hex_part).map_err(|_| invalid())
}

/// Validate user-supplied address text.
///
/// All-lowercase and all-uppercase forms are accepted as-is; mixed case must
/// carry a correct EIP-55 checksum.
pub fn validate_address(address: &str) -> Result<Address, ChainError> {
    let address = address.trim();
    let parsed = parse_address(address)?;

    let hex_part = &address[2..];
    let mixed_case = hex_part.chars().any(|c| c.is_ascii_lowercase())
        && hex_part.chars().any(|c| c.is_ascii_uppercase());
    if mixed_case {
        return Address::parse_checksummed(address, None)
            .map_err(|_| ChainError::InvalidAddress(format!("{address} (bad checksum)")));
    }
    Ok(parsed)
}

/// [`validate_address`], rendered in EIP-55 form.
pub fn checksummed(address: &str) -> Result<String, ChainError> {
    validate_address(address).map(|a| a.to_checksum(None))
}
