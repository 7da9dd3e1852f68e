//! Decimal-string <-> base-unit conversions for token amounts.

use alloy::primitives::U256;
use anyhow::{Context, Result};
use std::str::FromStr;

/// Parse a decimal amount string ("1.5", "0.0001") into base units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    let mut parts = trimmed.split('.');
    let whole = parts.next().unwrap_or("0");
    let frac = parts.next().unwrap_or("");

    if parts.next().is_some() {
        anyhow::bail!("Invalid amount format");
    }

    if frac.len() > decimals as usize {
        anyhow::bail!("Too many decimal places (max {})", decimals);
    }

    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("Invalid numeric characters in amount");
    }

    let mut frac_padded = frac.to_string();
    while frac_padded.len() < decimals as usize {
        frac_padded.push('0');
    }

    let whole_clean = if whole.is_empty() { "0" } else { whole };
    let amount_str = format!("{}{}", whole_clean, frac_padded);

    U256::from_str(&amount_str).context("Failed to parse amount to U256")
}

/// Render base units as a decimal string with trailing zeros trimmed.
pub fn format_units(raw_amount: U256, decimals: u8) -> String {
    let raw = raw_amount.to_string();
    let decimals = decimals as usize;

    let padded = if raw.len() <= decimals {
        format!("{:0>width$}", raw, width = decimals + 1)
    } else {
        raw
    };

    let split_at = padded.len().saturating_sub(decimals);
    let (whole, frac) = padded.split_at(split_at);
    let frac_trimmed = frac.trim_end_matches('0');
    let whole_clean = if whole.is_empty() { "0" } else { whole };

    if frac_trimmed.is_empty() {
        whole_clean.to_string()
    } else {
        format!("{}.{}", whole_clean, frac_trimmed)
    }
}

/// Lossy wei -> ETH conversion for display and threshold checks.
pub fn wei_to_eth(wei: U256) -> f64 {
    u128::try_from(wei).unwrap_or(u128::MAX) as f64 / 1e18
}

pub fn eth_to_wei(eth: f64) -> U256 {
    U256::from((eth * 1e18) as u128)
}
