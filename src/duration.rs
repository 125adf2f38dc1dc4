//! Human-readable durations for config values like `request_timeout = "10s"`.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer, Serializer};

const SECS_PER_DAY: u64 = 24 * 60 * 60;
const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_MINUTE: u64 = 60;

/// Parse a duration string like "1h", "10s", "30m" or "2d".
///
/// The unit suffix is case-insensitive and surrounding whitespace is ignored.
///
/// ```
/// use walletbook::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
/// assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let Some(unit) = s.chars().last() else {
        anyhow::bail!("Duration is empty");
    };

    let multiplier = match unit {
        'd' => SECS_PER_DAY,
        'h' => SECS_PER_HOUR,
        'm' => SECS_PER_MINUTE,
        's' => 1,
        _ => anyhow::bail!("Duration must end with d, h, m, or s"),
    };

    let num: u64 = s[..s.len() - 1]
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;
    let secs = num
        .checked_mul(multiplier)
        .context("Duration is too large")?;

    Ok(Duration::from_secs(secs))
}

/// Format a duration using the largest unit that divides it evenly.
///
/// ```
/// use walletbook::duration::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
/// assert_eq!(format_duration(Duration::from_secs(90)), "90s");
/// ```
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();

    for (unit, size) in [('d', SECS_PER_DAY), ('h', SECS_PER_HOUR), ('m', SECS_PER_MINUTE)] {
        if secs >= size && secs % size == 0 {
            return format!("{}{unit}", secs / size);
        }
    }
    format!("{secs}s")
}

/// Serde deserializer for duration strings.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

/// Serde serializer producing the same strings `deserialize_duration` accepts.
pub fn serialize_duration<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(2 * 86400));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_is_case_and_whitespace_insensitive() {
        assert_eq!(parse_duration(" 1H ").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("\t5S\n").unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("1w").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("-1h").is_err());
        assert!(parse_duration("1.5h").is_err());
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let max = u64::MAX.to_string();
        assert!(parse_duration(&format!("{max}d")).is_err());
        assert!(parse_duration(&format!("{max}s")).is_ok());
    }

    #[test]
    fn test_format_picks_largest_even_unit() {
        assert_eq!(format_duration(Duration::from_secs(86400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(600)), "10m");
        assert_eq!(format_duration(Duration::from_secs(3700)), "3700s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn test_serde_round_trip_through_toml() {
        #[derive(Serialize, Deserialize)]
        struct Timeouts {
            #[serde(
                serialize_with = "serialize_duration",
                deserialize_with = "deserialize_duration"
            )]
            request: Duration,
        }

        let parsed: Timeouts = toml::from_str(r#"request = "10s""#).unwrap();
        assert_eq!(parsed.request, Duration::from_secs(10));

        let rendered = toml::to_string(&parsed).unwrap();
        assert_eq!(rendered.trim(), r#"request = "10s""#);
    }
}
