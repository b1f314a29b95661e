//! Symbol normalization.

use crate::errors::MarketDataError;

/// Yahoo suffixes for the Indian exchanges (NSE, BSE).
pub const KNOWN_SUFFIXES: &[&str] = &[".NS", ".BO"];

const MAX_SYMBOL_LEN: usize = 32;

/// Trim, uppercase and suffix a caller-supplied symbol.
///
/// Symbols that already end in a known exchange suffix (or the configured
/// one) are kept as-is; bare tickers get `default_suffix` appended.
///
/// # Examples
///
/// ```
/// use prevclose_market_data::resolver::normalize_symbol;
///
/// assert_eq!(normalize_symbol(" reliance ", ".NS").unwrap(), "RELIANCE.NS");
/// assert_eq!(normalize_symbol("TCS.BO", ".NS").unwrap(), "TCS.BO");
/// assert!(normalize_symbol("   ", ".NS").is_err());
/// ```
pub fn normalize_symbol(raw: &str, default_suffix: &str) -> Result<String, MarketDataError> {
    let symbol = raw.trim().to_uppercase();

    if symbol.is_empty() {
        return Err(MarketDataError::Validation(
            "Stock symbol is required".to_string(),
        ));
    }

    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(MarketDataError::Validation(format!(
            "Stock symbol is too long: {}",
            symbol
        )));
    }

    if !symbol.chars().all(is_symbol_char) || symbol.starts_with('.') {
        return Err(MarketDataError::Validation(format!(
            "Invalid stock symbol: {}",
            symbol
        )));
    }

    let default_suffix = default_suffix.to_uppercase();
    let has_suffix = KNOWN_SUFFIXES
        .iter()
        .copied()
        .chain(std::iter::once(default_suffix.as_str()))
        .filter(|suffix| !suffix.is_empty())
        .any(|suffix| symbol.ends_with(suffix) && symbol.len() > suffix.len());

    if has_suffix {
        Ok(symbol)
    } else {
        Ok(format!("{}{}", symbol, default_suffix))
    }
}

/// Tickers like `M&M`, `BAJAJ-AUTO` and index symbols like `^NSEI` are valid.
fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '&' | '_' | '^')
}
