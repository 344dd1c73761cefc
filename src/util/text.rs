use std::{collections::HashSet, str::FromStr};

use anyhow::{anyhow, Result};
use rust_decimal::{Decimal, RoundingStrategy};

const NUMBER_ESCAPE_CHAR: &[char] = &[',', ' ', '"', '\n'];
/// 顯示價格時保留的小數位數
const PRICE_DP: u32 = 4;

/// Parses a decimal value from a given string.
///
/// Thousands separators, surrounding quotes and blanks are stripped before
/// parsing. Extra characters to strip can be passed in `escape_chars`.
///
/// # Example
///
/// ```
/// let s = "1,234.56";
/// let decimal_value = parse_decimal(s, None).unwrap();
/// ```
pub fn parse_decimal(s: &str, escape_chars: Option<Vec<char>>) -> Result<Decimal> {
    let cleaned = clean_escape_chars(s, escape_chars);
    Decimal::from_str(&cleaned)
        .map_err(|why| anyhow!("Failed to parse '{}' as Decimal because {:?}", cleaned, why))
}

/// Same as [`parse_decimal`] but rejects zero and negative values.
pub fn parse_positive_decimal(s: &str) -> Result<Decimal> {
    let d = parse_decimal(s, None)?;
    if d <= Decimal::ZERO {
        return Err(anyhow!("'{}' is not a positive decimal", s));
    }

    Ok(d)
}

/// Formats a price with four decimals, rounding half away from zero.
///
/// `Decimal`'s own `{:.4}` truncates, so the value is rounded first.
pub fn format_price(d: &Decimal) -> String {
    format!(
        "{:.4}",
        d.round_dp_with_strategy(PRICE_DP, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Removes the default number escape characters plus `escape_chars` from `s`.
pub(crate) fn clean_escape_chars(s: &str, escape_chars: Option<Vec<char>>) -> String {
    let mut combined: Vec<char> = NUMBER_ESCAPE_CHAR.to_vec();
    if let Some(ec) = escape_chars {
        combined.extend(ec);
    }

    let filters = combined.iter().collect::<HashSet<_>>();
    s.chars().filter(|c| !filters.contains(c)).collect()
}
