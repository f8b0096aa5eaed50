//! Guards for values spliced into generated SQL.
//!
//! Joins and aggregations are DataFusion SQL built from column names found in
//! the input tables. A name only reaches a query as a [`SqlIdent`], which can
//! be constructed from a validated name and nothing else. Numeric parameters go
//! through [`check_fraction`].

use crate::error::{EtlError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

const MAX_IDENT_LEN: usize = 128;

#[allow(clippy::expect_used)]
static PLAIN_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// A column or table name checked to be a plain identifier.
///
/// `Display` renders it double-quoted, so a mixed-case name keeps its case.
///
/// ```rust
/// use commerce_etl::security::SqlIdent;
///
/// assert_eq!(SqlIdent::new("order_id")?.to_string(), "\"order_id\"");
/// assert!(SqlIdent::new("id; DROP TABLE orders--").is_err());
/// # Ok::<(), commerce_etl::error::EtlError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlIdent(String);

impl SqlIdent {
    pub fn new(name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(EtlError::SecurityError(
                "SQL identifier must not be blank".to_string(),
            ));
        }
        if name.len() > MAX_IDENT_LEN {
            return Err(EtlError::SecurityError(format!(
                "SQL identifier longer than {MAX_IDENT_LEN} bytes: '{}...'",
                name.chars().take(32).collect::<String>()
            )));
        }
        if !PLAIN_IDENT.is_match(name) {
            return Err(EtlError::SecurityError(format!(
                "'{}' is not a plain identifier (letters, digits and '_', not starting with a digit)",
                name.escape_debug()
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

/// Quotes each name with a table alias prefix, e.g. `r."city", r."country"`.
pub fn qualified_list<'a>(alias: &str, names: impl IntoIterator<Item = &'a str>) -> Result<String> {
    let parts = names
        .into_iter()
        .map(|name| SqlIdent::new(name).map(|ident| format!("{alias}.{ident}")))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

/// Checks that `value` is a finite number in `[0, 1]`.
pub fn check_fraction(value: f64, name: &str) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EtlError::Configuration(format!(
            "{name} must be a fraction between 0.0 and 1.0, got {value}"
        )))
    }
}
