use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Offset-less layouts seen in the wild, interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

/// Parses a feed publish date.
///
/// Tries RFC 2822 (RSS `pubDate`), then RFC 3339 (Atom `published`), then a
/// handful of sloppier layouts. Anything else, including a missing or blank
/// value, yields `None`: a bad date never fails the item.
pub fn parse_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // ISO 8601 with a colon-less offset, e.g. 2024-01-05T10:00:00+0100
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    tracing::debug!(value = %value, "Unparsable feed date, leaving publish date empty");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_rfc2822() {
        assert_eq!(
            parse_date(Some("Mon, 02 Jan 2006 15:04:05 GMT")),
            Some(utc(2006, 1, 2, 15, 4, 5))
        );
        assert_eq!(
            parse_date(Some("Tue, 10 Jun 2003 04:00:00 -0500")),
            Some(utc(2003, 6, 10, 9, 0, 0))
        );
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(
            parse_date(Some("2024-03-01T10:00:00+02:00")),
            Some(utc(2024, 3, 1, 8, 0, 0))
        );
        assert_eq!(
            parse_date(Some("2003-12-13T18:30:02Z")),
            Some(utc(2003, 12, 13, 18, 30, 2))
        );
    }

    #[test]
    fn test_colonless_offset() {
        assert_eq!(
            parse_date(Some("2024-01-05T10:00:00+0100")),
            Some(utc(2024, 1, 5, 9, 0, 0))
        );
    }

    #[test]
    fn test_naive_layouts_are_utc() {
        assert_eq!(
            parse_date(Some("2024-01-05 10:30:00")),
            Some(utc(2024, 1, 5, 10, 30, 0))
        );
        assert_eq!(parse_date(Some("2024-01-05")), Some(utc(2024, 1, 5, 0, 0, 0)));
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert_eq!(
            parse_date(Some("\n   2003-12-13T18:30:02Z  ")),
            Some(utc(2003, 12, 13, 18, 30, 2))
        );
    }

    #[test]
    fn test_garbage_and_missing_are_none() {
        assert_eq!(parse_date(Some("not-a-date")), None);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(Some("   ")), None);
        assert_eq!(parse_date(None), None);
    }
}
