//! Currency unit conversions.
//!
//! Balances at rest are integer base units: nanos (1e-9 BitClout),
//! wei (1e-18 Ether) and micro (1e-6 USDC). All matching arithmetic stays in
//! exact decimals; rounding to an integer happens only here, at the base-unit
//! boundary.

use rust_decimal::Decimal;

pub const NANOS_PER_BITCLOUT: u64 = 1_000_000_000;
pub const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;
pub const MICRO_PER_USDC: u64 = 1_000_000;

/// BitClout (human units) to nanos, rounded to the nearest integer.
pub fn to_nanos(clout: Decimal) -> Decimal {
    (clout * Decimal::from(NANOS_PER_BITCLOUT)).round()
}

/// Nanos to BitClout human units.
pub fn from_nanos(nanos: Decimal) -> Decimal {
    nanos / Decimal::from(NANOS_PER_BITCLOUT)
}

/// Ether (human units) to wei, rounded to the nearest integer.
pub fn to_wei(ether: Decimal) -> Decimal {
    (ether * Decimal::from(WEI_PER_ETHER)).round()
}

/// Wei to Ether human units.
pub fn from_wei(wei: Decimal) -> Decimal {
    wei / Decimal::from(WEI_PER_ETHER)
}

/// USDC (human units) to micro units, rounded to the nearest integer.
pub fn to_micro(usdc: Decimal) -> Decimal {
    (usdc * Decimal::from(MICRO_PER_USDC)).round()
}

/// Micro units to USDC human units.
pub fn from_micro(micro: Decimal) -> Decimal {
    micro / Decimal::from(MICRO_PER_USDC)
}
