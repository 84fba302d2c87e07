//! Decoder for the `vcgencmd get_throttled` status word.
//!
//! The tool prints a single line such as `throttled=0x50005`. Each bit of the
//! word flags an independent condition; the low nibble reports the current
//! state and bits 16-19 report whether the condition occurred since boot.

use rpi_exporter_common::MetricKind;

use super::{DecodedFact, FactValue, MetricSpec};
use crate::error::ParseError;

/// One named bit of the throttled status word.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleBit {
    pub position: u32,
    pub metric: &'static str,
    pub help: &'static str,
}

pub const THROTTLE_BITS: [ThrottleBit; 8] = [
    ThrottleBit {
        position: 0,
        metric: "undervoltage_detected",
        help: "Power supply voltage is currently under threshold",
    },
    ThrottleBit {
        position: 1,
        metric: "arm_frequency_capped",
        help: "ARM chip clock speed is currently capped",
    },
    ThrottleBit {
        position: 2,
        metric: "throttled",
        help: "CPU is currently throttled",
    },
    ThrottleBit {
        position: 3,
        metric: "soft_temp_limit_active",
        help: "Soft temperature limit is currently active",
    },
    ThrottleBit {
        position: 16,
        metric: "undervoltage_occurred",
        help: "Under-voltage has occurred since boot",
    },
    ThrottleBit {
        position: 17,
        metric: "arm_frequency_capped_occurred",
        help: "ARM frequency capping has occurred since boot",
    },
    ThrottleBit {
        position: 18,
        metric: "throttled_occurred",
        help: "Throttling has occurred since boot",
    },
    ThrottleBit {
        position: 19,
        metric: "soft_temp_limit_occurred",
        help: "Soft temperature limit has occurred since boot",
    },
];

/// The raw status word, exported alongside the decoded flags.
pub const STATUS_WORD: MetricSpec = MetricSpec {
    name: "throttled_status_word",
    help: "Raw throttled status word reported by vcgencmd",
    kind: MetricKind::Gauge,
    label_names: &[],
};

/// Every metric this decoder can produce.
pub fn metric_specs() -> impl Iterator<Item = MetricSpec> {
    THROTTLE_BITS
        .iter()
        .map(|bit| MetricSpec {
            name: bit.metric,
            help: bit.help,
            kind: MetricKind::Gauge,
            label_names: &[],
        })
        .chain(std::iter::once(STATUS_WORD))
}

/// Test whether bit `position` is set in `value`.
pub fn has_bit(value: u64, position: u32) -> bool {
    (value & (1 << position)) != 0
}

/// Parse the hexadecimal status word out of the tool's output.
///
/// Only the text after the first `=` is considered; a `0x` prefix is optional.
pub fn parse_status_word(raw: &[u8]) -> Result<u64, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| ParseError::NotUtf8)?;
    let value = match text.split_once('=') {
        Some((_, value)) => value,
        None => text,
    };
    let value = value.trim();

    if value.is_empty() {
        return Err(ParseError::Empty);
    }

    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    // from_str_radix tolerates a leading sign
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidHex {
            value: value.to_string(),
            source: None,
        });
    }

    u64::from_str_radix(digits, 16).map_err(|source| ParseError::InvalidHex {
        value: value.to_string(),
        source: Some(source),
    })
}

/// Decode the tool's output into one boolean fact per named bit, plus the
/// raw word.
pub fn decode(raw: &[u8]) -> Result<Vec<DecodedFact>, ParseError> {
    let word = parse_status_word(raw)?;

    let mut facts: Vec<DecodedFact> = THROTTLE_BITS
        .iter()
        .map(|bit| {
            DecodedFact::new(
                bit.metric,
                MetricKind::Gauge,
                FactValue::Bool(has_bit(word, bit.position)),
            )
        })
        .collect();

    facts.push(DecodedFact::new(
        STATUS_WORD.name,
        STATUS_WORD.kind,
        FactValue::Int(word),
    ));

    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(facts: &[DecodedFact], metric: &str) -> bool {
        match facts.iter().find(|f| f.metric == metric).map(|f| f.value) {
            Some(FactValue::Bool(v)) => v,
            other => panic!("no boolean fact for {}: {:?}", metric, other),
        }
    }

    #[test]
    fn test_parse_status_word() {
        assert_eq!(parse_status_word(b"throttled=0x50005\n").unwrap(), 0x50005);
        assert_eq!(parse_status_word(b"throttled=0x0").unwrap(), 0);
        assert_eq!(parse_status_word(b"0x80008").unwrap(), 0x80008);
        assert_eq!(parse_status_word(b"throttled=50005").unwrap(), 0x50005);
        assert_eq!(parse_status_word(b"  throttled=0XE0000  ").unwrap(), 0xE0000);
    }

    #[test]
    fn test_parse_status_word_invalid() {
        assert!(matches!(
            parse_status_word(b"not-a-number"),
            Err(ParseError::InvalidHex { .. })
        ));
        assert!(matches!(
            parse_status_word(b"throttled=0xZZ"),
            Err(ParseError::InvalidHex { .. })
        ));
        assert!(matches!(
            parse_status_word(b"throttled=0x+5"),
            Err(ParseError::InvalidHex { source: None, .. })
        ));
        assert!(matches!(
            parse_status_word(b"throttled=+5"),
            Err(ParseError::InvalidHex { .. })
        ));
        assert!(matches!(
            parse_status_word(b"throttled=-5"),
            Err(ParseError::InvalidHex { .. })
        ));
        assert!(matches!(
            parse_status_word(b"throttled=0x"),
            Err(ParseError::InvalidHex { .. })
        ));
        assert!(matches!(
            parse_status_word(b"throttled="),
            Err(ParseError::Empty)
        ));
        assert!(matches!(parse_status_word(b""), Err(ParseError::Empty)));
        assert!(matches!(
            parse_status_word(&[0xff, 0xfe]),
            Err(ParseError::NotUtf8)
        ));
    }

    #[test]
    fn test_decode_50005() {
        let facts = decode(b"throttled=0x50005\n").unwrap();

        assert!(flag(&facts, "undervoltage_detected"));
        assert!(!flag(&facts, "arm_frequency_capped"));
        assert!(flag(&facts, "throttled"));
        assert!(!flag(&facts, "soft_temp_limit_active"));
        assert!(flag(&facts, "undervoltage_occurred"));
        assert!(!flag(&facts, "arm_frequency_capped_occurred"));
        assert!(flag(&facts, "throttled_occurred"));
        assert!(!flag(&facts, "soft_temp_limit_occurred"));
    }

    #[test]
    fn test_decode_matches_bit_test_for_every_flag() {
        for word in [0u64, 0x1, 0x2, 0x4, 0x8, 0xF, 0x50005, 0xF000F, 0xFFFFFFFF] {
            let facts = decode(format!("throttled=0x{:x}", word).as_bytes()).unwrap();

            assert_eq!(facts.len(), THROTTLE_BITS.len() + 1);
            for bit in THROTTLE_BITS {
                assert_eq!(
                    flag(&facts, bit.metric),
                    word & (1 << bit.position) != 0,
                    "word {:#x}, bit {}",
                    word,
                    bit.position
                );
            }
        }
    }

    #[test]
    fn test_decode_includes_raw_word() {
        let facts = decode(b"throttled=0x50005").unwrap();
        let word = facts
            .iter()
            .find(|f| f.metric == "throttled_status_word")
            .unwrap();

        assert_eq!(word.value, FactValue::Int(0x50005));
    }

    #[test]
    fn test_decode_invalid_produces_no_facts() {
        assert!(decode(b"not-a-number").is_err());
    }

    #[test]
    fn test_metric_specs_cover_every_fact() {
        let names: Vec<_> = metric_specs().map(|s| s.name).collect();
        let facts = decode(b"throttled=0x0").unwrap();

        for fact in facts {
            assert!(names.contains(&fact.metric), "{} not declared", fact.metric);
        }
    }
}
