//! # Time Normalizer
//! Turns the two upstream timestamp encodings into one canonical
//! `DateTime<Utc>`:
//!
//! - news `pubDate`: RFC 2822 (`Fri, 03 Jan 2025 09:15:30 +0900`)
//! - disclosure `rcept_dt`: compact `YYYYMMDDHHMMSS`, always KST (+09:00)
//!
//! Malformed input never errors; it degrades to `None`. `Option<DateTime<Utc>>`
//! orders `None` before every `Some`, so "no timestamp" sorts as oldest.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// KST offset in seconds. The disclosure feed never states its zone.
const KST_OFFSET_SECS: i32 = 9 * 3600;

/// How a source encodes its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEncoding {
    Rfc2822,
    CompactKst,
}

static KST: Lazy<FixedOffset> =
    Lazy::new(|| FixedOffset::east_opt(KST_OFFSET_SECS).expect("+09:00 is a valid offset"));

/// Fixed +09:00 zone used by the disclosure feed.
pub fn kst() -> FixedOffset {
    *KST
}

/// Normalize `raw` according to `enc`. Blank or unparseable input → `None`.
pub fn normalize(raw: Option<&str>, enc: TimeEncoding) -> Option<DateTime<Utc>> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    let parsed = match enc {
        TimeEncoding::Rfc2822 => parse_rfc2822(s),
        TimeEncoding::CompactKst => parse_compact_kst(s),
    };
    if parsed.is_none() {
        tracing::debug!(target: "feed", raw = s, ?enc, "unparseable timestamp");
    }
    parsed
}

fn parse_rfc2822(s: &str) -> Option<DateTime<Utc>> {
    let odt = OffsetDateTime::parse(s, &Rfc2822).ok()?;
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

fn parse_compact_kst(s: &str) -> Option<DateTime<Utc>> {
    if s.len() != 14 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| s[range].parse::<u32>().ok();
    let year = i32::try_from(field(0..4)?).ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)?.and_hms_opt(
        field(8..10)?,
        field(10..12)?,
        field(12..14)?,
    )?;
    kst()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canonical string form used on the wire and inside dedup keys.
pub fn canonical(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_rejects_wrong_shapes() {
        for bad in ["2025010309153", "2025-01-03 09:15", "20251303091530", "2025010325xx30", "20250103"] {
            assert_eq!(normalize(Some(bad), TimeEncoding::CompactKst), None, "{bad}");
        }
    }

    #[test]
    fn kst_is_plus_nine() {
        assert_eq!(kst().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn blank_is_none() {
        assert_eq!(normalize(None, TimeEncoding::Rfc2822), None);
        assert_eq!(normalize(Some("   "), TimeEncoding::Rfc2822), None);
    }

    #[test]
    fn none_sorts_before_known_times() {
        let t = normalize(Some("20250103091530"), TimeEncoding::CompactKst);
        assert!(None < t);
    }

    #[test]
    fn canonical_is_utc_seconds() {
        let t = normalize(Some("20250103091530"), TimeEncoding::CompactKst).unwrap();
        assert_eq!(canonical(&t), "2025-01-03T00:15:30Z");
    }
}
