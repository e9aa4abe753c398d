//! Duration literal parsing for the `delay` kernel.
//!
//! Accepts a decimal number followed by one of `ns`, `us`, `µs`, `ms`,
//! `s`, `m`, `h`; terms concatenate (`"1h30m"`). Fractions are allowed
//! (`"1.5s"`).

use std::time::Duration;

use thiserror::Error;

/// Errors from parsing a duration literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// The literal was empty.
    #[error("empty duration")]
    Empty,

    /// A term had no leading number.
    #[error("missing number in duration {0:?}")]
    MissingNumber(String),

    /// A term's number did not parse.
    #[error("invalid number {0:?} in duration")]
    InvalidNumber(String),

    /// A term had no unit.
    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    /// A term's unit was not recognized.
    #[error("unknown duration unit {0:?}")]
    UnknownUnit(String),
}

/// Parse a duration literal such as `"250ms"`, `"2s"`, or `"1h30m"`.
///
/// ```rust
/// use std::time::Duration;
/// use manifold::parse_duration;
///
/// assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
/// assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
/// ```
pub fn parse_duration(text: &str) -> Result<Duration, DurationError> {
    if text.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(DurationError::MissingNumber(text.to_string()));
        }
        let number: f64 = rest[..number_end]
            .parse()
            .map_err(|_| DurationError::InvalidNumber(rest[..number_end].to_string()))?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        let nanos_per_unit: f64 = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => return Err(DurationError::MissingUnit(text.to_string())),
            other => return Err(DurationError::UnknownUnit(other.to_string())),
        };
        total += Duration::from_nanos((number * nanos_per_unit).round() as u64);
        rest = &rest[unit_end..];
    }

    Ok(total)
}
