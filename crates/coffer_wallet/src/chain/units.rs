//! Human decimal amounts on top of `alloy_primitives::utils`.

use alloy_primitives::U256;
use alloy_primitives::utils::{format_units, parse_units};

/// Parse a decimal amount such as `"1.5"` into base units with `decimals`
/// fractional digits.
///
/// Stricter than [`parse_units`]: signs, exponents and digits beyond the
/// asset's precision are rejected instead of truncated.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err("amount is empty".into());
    }

    let (int_part, frac_part) = amount.split_once('.').unwrap_or((amount, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(format!("'{amount}' is not a number"));
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return Err(format!("'{amount}' is not a non-negative decimal number"));
    }

    let frac = frac_part.trim_end_matches('0');
    if frac.len() > decimals as usize {
        return Err(format!("'{amount}' has more than {decimals} decimal places"));
    }

    let int = if int_part.is_empty() { "0" } else { int_part };
    let normalized = if frac.is_empty() {
        int.to_string()
    } else {
        format!("{int}.{frac}")
    };
    parse_units(&normalized, decimals)
        .map(|parsed| parsed.get_absolute())
        .map_err(|e| format!("'{amount}': {e}"))
}

/// Format base units for display: trailing zeros dropped, at least one
/// fractional digit kept (`"1.5"`, `"2.0"`).
pub fn to_display(value: U256, decimals: u8) -> Result<String, String> {
    let full = format_units(value, decimals).map_err(|e| e.to_string())?;
    let (int, frac) = full.split_once('.').unwrap_or((&full, ""));
    let frac = frac.trim_end_matches('0');
    Ok(if frac.is_empty() {
        format!("{int}.0")
    } else {
        format!("{int}.{frac}")
    })
}
