//! Instrument Catalog Domain
//!
//! Core types for the daily instrument catalog: the instrument attribute
//! bag, the ordered catalog, and the selection/canonicalization logic that
//! derives the single target contract the bridge streams.
//!
//! The catalog is fetched once per process and is read-only after
//! construction; selection scans it in document order and the first match
//! wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Instrument
// =============================================================================

/// A single catalog record.
///
/// Catalog records are flat string-keyed objects. The fields the bridge
/// inspects are lifted into typed accessors; everything else the exchange
/// publishes is retained verbatim in `attributes`. Instruments are immutable
/// once parsed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Instrument {
    /// Exchange-scoped instrument identifier, e.g. `"NSE_FO|12345"`.
    #[serde(default)]
    pub instrument_key: String,
    /// Human-readable trading symbol, e.g. `"BANKNIFTY FUT 30 APR 25"`.
    #[serde(default)]
    pub trading_symbol: String,
    /// Instrument class, e.g. `"FUT"`, `"CE"`, `"PE"`, `"EQ"`.
    #[serde(default)]
    pub instrument_type: String,
    /// Expiry date in `YYYY-MM-DD` form; empty for non-derivatives.
    #[serde(default)]
    pub expiry: String,
    /// All remaining attributes, untouched.
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, Value>,
}

impl Instrument {
    /// Year-month of the expiry date (`"2025-04"`), or `None` when the
    /// expiry is absent or not a valid calendar date.
    #[must_use]
    pub fn expiry_month(&self) -> Option<String> {
        chrono::NaiveDate::parse_from_str(&self.expiry, "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%Y-%m").to_string())
    }

    /// Exchange segment of the instrument key (the part before `|`).
    #[must_use]
    pub fn exchange_segment(&self) -> &str {
        self.instrument_key
            .split('|')
            .next()
            .unwrap_or(&self.instrument_key)
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// The full daily set of tradable instruments, in document order.
///
/// Built once from a single fetch; never refreshed within a process
/// lifetime.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    instruments: Vec<Instrument>,
}

impl Catalog {
    /// Create a catalog from already-parsed instruments.
    #[must_use]
    pub const fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }

    /// Parse a catalog from a decompressed JSON array.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error when the payload is not a
    /// JSON array of flat objects.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let instruments: Vec<Instrument> = serde_json::from_slice(bytes)?;
        Ok(Self { instruments })
    }

    /// Number of instruments in the catalog.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Check whether the catalog holds no instruments.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Iterate instruments in document order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instrument> {
        self.instruments.iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Instrument;
    type IntoIter = std::slice::Iter<'a, Instrument>;

    fn into_iter(self) -> Self::IntoIter {
        self.instruments.iter()
    }
}

// =============================================================================
// Contract Selection
// =============================================================================

/// The fixed underlying/month the bridge looks for in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTarget {
    /// Underlying name that must appear in the trading symbol.
    pub underlying: String,
    /// Target expiry month in `YYYY-MM` form.
    pub expiry_month: String,
}

impl ContractTarget {
    /// Create a new target.
    #[must_use]
    pub const fn new(underlying: String, expiry_month: String) -> Self {
        Self {
            underlying,
            expiry_month,
        }
    }

    /// Check whether an instrument is the contract this target describes.
    #[must_use]
    pub fn matches(&self, instrument: &Instrument) -> bool {
        instrument.instrument_type == "FUT"
            && instrument.trading_symbol.contains(&self.underlying)
            && instrument.expiry_month().as_deref() == Some(self.expiry_month.as_str())
    }
}

/// The single derivative contract selected from the catalog.
///
/// Written at most once per process (first successful resolution), read
/// many times afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedContract {
    /// Raw instrument key from the catalog record.
    pub instrument_key: String,
    /// Canonical exchange-qualified symbol, e.g. `"NSE_FO:BANKNIFTY25APRFUT"`.
    pub trading_symbol: String,
}

/// Scan the catalog in document order for the target contract.
///
/// The first instrument matching the target wins; scanning stops there.
/// Document order is authoritative -- there is deliberately no
/// most-recent-expiry tie-break. Returns `None` when no record matches,
/// which callers must treat as "not found", never as a failure.
#[must_use]
pub fn select_contract(catalog: &Catalog, target: &ContractTarget) -> Option<ResolvedContract> {
    let instrument = catalog.iter().find(|i| target.matches(i))?;

    Some(ResolvedContract {
        instrument_key: instrument.instrument_key.clone(),
        trading_symbol: canonicalize_symbol(
            &instrument.trading_symbol,
            instrument.exchange_segment(),
        ),
    })
}

/// Canonicalize a raw trading symbol into the exchange-qualified feed form.
///
/// Symbols shaped `"<NAME> FUT <dd> <MON> <yy>"` become
/// `"<EXCHANGE>:<NAME><yy><MON>FUT"`. Anything else falls back to the raw
/// symbol with whitespace stripped, prefixed with the exchange segment.
#[must_use]
pub fn canonicalize_symbol(raw: &str, exchange: &str) -> String {
    parse_future_symbol(raw).map_or_else(
        || {
            let stripped: String = raw.split_whitespace().collect();
            format!("{exchange}:{stripped}")
        },
        |(name, month, year)| format!("{exchange}:{name}{year}{month}FUT"),
    )
}

/// Parse the fixed monthly-future symbol shape.
///
/// Expects whitespace-separated tokens `<NAME..> FUT <dd> <MON> <yy>` where
/// `dd` is a 1-2 digit day, `MON` a three-letter month, and `yy` a
/// two-digit year. Returns the concatenated name, month, and year tokens.
fn parse_future_symbol(raw: &str) -> Option<(String, &str, &str)> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() < 5 {
        return None;
    }

    let (name_tokens, tail) = tokens.split_at(tokens.len() - 4);
    let [marker, day, month, year] = tail else {
        return None;
    };

    if *marker != "FUT" {
        return None;
    }
    if day.is_empty() || day.len() > 2 || !day.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if month.len() != 3 || !month.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    if year.len() != 2 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((name_tokens.concat(), month, year))
}
