//! Run interval parsing (`<integer><unit>`, unit one of `s`, `m`, `h`, `d`).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

const UNITS: [(char, u64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

/// Cadence at which the connector starts a new run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunInterval(Duration);

impl RunInterval {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for RunInterval {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            Error::config(format!(
                "Invalid run interval '{raw}', it should be a string like '7d', '2h', '2m' \
                 using one of the following suffixes: d, h, m, s"
            ))
        };

        let trimmed = raw.trim();
        let unit = trimmed.chars().last().ok_or_else(invalid)?;
        let multiplier = UNITS
            .iter()
            .find(|(suffix, _)| *suffix == unit.to_ascii_lowercase())
            .map(|(_, secs)| *secs)
            .ok_or_else(invalid)?;

        let digits = &trimmed[..trimmed.len() - unit.len_utf8()];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let amount: u64 = digits.parse().map_err(|_| invalid())?;
        if amount == 0 {
            return Err(Error::config(format!(
                "Invalid run interval '{raw}': must be greater than zero"
            )));
        }

        let secs = amount.checked_mul(multiplier).ok_or_else(invalid)?;
        Ok(Self(Duration::from_secs(secs)))
    }
}

impl fmt::Display for RunInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        for (suffix, unit) in UNITS {
            if secs >= unit && secs % unit == 0 {
                return write!(f, "{}{}", secs / unit, suffix);
            }
        }
        write!(f, "{secs}s")
    }
}
