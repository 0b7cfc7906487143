//! Parsing helpers for the string-encoded numerics quoting services put on
//! the wire. Amounts and block numbers arrive as decimal strings; pool state
//! arrives as stringified big integers.

use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversionError {
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

pub fn parse_decimal(s: &str) -> Result<Decimal, ConversionError> {
    Decimal::from_str(s.trim()).map_err(|e| ConversionError::InvalidDecimal(e.to_string()))
}

pub fn parse_block_number(s: &str) -> Result<u64, ConversionError> {
    s.trim()
        .parse::<u64>()
        .map_err(|e| ConversionError::InvalidInteger(format!("{}: {}", s, e)))
}

pub fn parse_u256(s: &str) -> Result<U256, ConversionError> {
    U256::from_dec_str(s.trim()).map_err(|e| ConversionError::InvalidInteger(e.to_string()))
}

/// Like [`parse_u256`] but bounds-checked into `u128`; `U256::as_u128` panics
/// on overflow and wire input must never panic.
pub fn parse_u128(s: &str) -> Result<u128, ConversionError> {
    let value = parse_u256(s)?;
    if value > U256::from(u128::MAX) {
        return Err(ConversionError::InvalidInteger(format!(
            "{} exceeds u128 range",
            s.trim()
        )));
    }
    Ok(value.as_u128())
}

pub fn parse_address(s: &str) -> Result<Address, ConversionError> {
    Address::from_str(s.trim()).map_err(|e| ConversionError::InvalidAddress(e.to_string()))
}

pub fn address_to_string(addr: Address) -> String {
    format!("{:?}", addr).to_lowercase()
}
