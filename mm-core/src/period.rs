use thiserror::Error;

/// All errors generated when parsing a period string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("period string is empty")]
    Empty,

    #[error("unrecognised period unit in {0:?}, expected one of s|m|h|d")]
    UnknownUnit(String),

    #[error("no numeric prefix in period string {0:?}")]
    MissingNumber(String),
}

/// Parses a period string such as `"1s"`, `"15m"`, `"1h"`, `"2d"` into milliseconds.
///
/// The string is trimmed and lowercased before parsing; the trailing character
/// selects the unit (`s`, `m`, `h`, `d`) and the numeric prefix is multiplied by it.
pub fn period_to_ms(period: &str) -> Result<u64, PeriodError> {
    let trimmed = period.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err(PeriodError::Empty);
    }

    let unit_ms = match trimmed.chars().last() {
        Some('s') => 1_000u64,
        Some('m') => 60_000,
        Some('h') => 3_600_000,
        Some('d') => 86_400_000,
        _ => return Err(PeriodError::UnknownUnit(trimmed)),
    };

    let prefix = &trimmed[..trimmed.len() - 1];
    let value: u64 = prefix
        .parse()
        .map_err(|_| PeriodError::MissingNumber(trimmed.clone()))?;

    Ok(value * unit_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(period_to_ms("1s").unwrap(), 1_000);
        assert_eq!(period_to_ms("1m").unwrap(), 60_000);
        assert_eq!(period_to_ms("1h").unwrap(), 3_600_000);
        assert_eq!(period_to_ms("2d").unwrap(), 172_800_000);
    }

    #[test]
    fn trims_and_lowercases() {
        assert_eq!(period_to_ms("  15M ").unwrap(), 900_000);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(period_to_ms("").is_err());
        assert!(period_to_ms("abc").is_err());
        assert!(period_to_ms("10x").is_err());
    }
}
