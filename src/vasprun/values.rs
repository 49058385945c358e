//! Numeric tokens as VASP writes them.
//!
//! Fortran output overflows a fixed-width field as a run of `*`, and some
//! builds print `NaN` or `n/a` for quantities that were never computed. Those
//! tokens are missing values, not errors.

use std::num::ParseFloatError;

const MISSING: &[&str] = &["nan", "-nan", "n/a", "na", "none", "-", "--", "?"];

pub(crate) fn is_placeholder(token: &str) -> bool {
    token.is_empty()
        || token.contains("**")
        || token.bytes().all(|b| b == b'*')
        || MISSING.iter().any(|m| token.eq_ignore_ascii_case(m))
}

/// Parse one token; `Ok(None)` for a placeholder.
pub(crate) fn parse_number(token: &str) -> Result<Option<f64>, ParseFloatError> {
    let token = token.trim();
    if is_placeholder(token) {
        return Ok(None);
    }
    match token.parse::<f64>() {
        Ok(v) => Ok(Some(v)),
        // Fortran double-precision exponent: 1.0D+02
        Err(err) if token.contains(['D', 'd']) => token.replace(['D', 'd'], "E").parse().map(Some).map_err(|_| err),
        Err(err) => Err(err),
    }
}

/// Parse a whitespace separated row; the first bad token is returned as the error.
pub(crate) fn parse_row(text: &str) -> Result<Vec<Option<f64>>, String> {
    text.split_whitespace().map(|tok| parse_number(tok).map_err(|_| tok.to_string())).collect()
}
