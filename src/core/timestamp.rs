use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, SecondsFormat, TimeZone};

pub const FRAME_EXTENSION: &str = "jpeg";

pub fn utc_ns_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// RFC 3339 with offset and milliseconds, e.g. `2024-05-01T12:00:00.250+02:00`.
pub fn rfc3339<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.to_rfc3339_opts(SecondsFormat::Millis, false)
}

pub fn frame_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}.{}", rfc3339(at), FRAME_EXTENSION)
}

pub fn frame_file_name_now() -> String {
    frame_file_name(&Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn frame_names_use_rfc3339_millis() {
        let at = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 3)
            .unwrap()
            + chrono::Duration::milliseconds(250);

        assert_eq!(frame_file_name(&at), "2024-05-01T12:00:03.250+02:00.jpeg");
    }

    #[test]
    fn frames_within_one_second_sort_in_capture_order() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 3).unwrap();
        let early = frame_file_name(&(base + chrono::Duration::milliseconds(90)));
        let late = frame_file_name(&(base + chrono::Duration::milliseconds(910)));

        assert_ne!(early, late);
        assert!(early < late);
    }

    #[test]
    fn utc_frame_names_keep_offset_form() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 3).unwrap();
        assert_eq!(frame_file_name(&at), "2024-05-01T12:00:03.000+00:00.jpeg");
    }

    #[test]
    fn now_is_after_epoch() {
        assert!(utc_ns_now() > 1_600_000_000 * 1_000_000_000);
        assert!(frame_file_name_now().ends_with(".jpeg"));
    }
}
