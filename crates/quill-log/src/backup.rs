//! Backup file naming
//!
//! A backup is the log path with `.<YYYY>.<MM>.<DD>.<hh>.<mm>.<ss>.<nnnnnnnnn>`
//! appended. Every field is zero-padded, so lexical order of backup names of
//! one log equals their chronological order.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

/// Timestamp layout appended to rotated log files
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y.%m.%d.%H.%M.%S.%f";

const FIELD_WIDTHS: [usize; 7] = [4, 2, 2, 2, 2, 2, 9];

/// Timestamp suffix for a backup rotated at `at`
pub fn backup_stamp(at: NaiveDateTime) -> String {
    at.format(BACKUP_TIMESTAMP_FORMAT).to_string()
}

/// Full backup path for `log_path` rotated at `at`
pub fn backup_path(log_path: &Path, at: NaiveDateTime) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(".");
    name.push(backup_stamp(at));
    PathBuf::from(name)
}

/// Parse a suffix produced by [`backup_stamp`]
///
/// Only the exact layout is accepted: seven dot-separated, fixed-width digit
/// fields that form a valid date and time.
pub fn parse_backup_stamp(stamp: &str) -> Option<NaiveDateTime> {
    let mut fields = [0u32; 7];
    let mut parts = stamp.split('.');

    for (field, width) in fields.iter_mut().zip(FIELD_WIDTHS) {
        let part = parts.next()?;
        if part.len() != width || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *field = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }

    let [year, month, day, hour, minute, second, nanos] = fields;
    NaiveDate::from_ymd_opt(year as i32, month, day)?.and_hms_nano_opt(hour, minute, second, nanos)
}

/// Rotation time of `file_name` if it is a backup of the log named `base_name`
pub fn backup_time(file_name: &str, base_name: &str) -> Option<NaiveDateTime> {
    if file_name == base_name {
        return None;
    }
    let stamp = file_name.strip_prefix(base_name)?.strip_prefix('.')?;
    parse_backup_stamp(stamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ns: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_nano_opt(h, mi, s, ns)
            .unwrap()
    }

    #[test]
    fn test_backup_path_layout() {
        let path = backup_path(Path::new("/var/log/app.log"), at(2024, 1, 2, 3, 4, 5, 6));
        assert_eq!(
            path,
            PathBuf::from("/var/log/app.log.2024.01.02.03.04.05.000000006")
        );
    }

    #[test]
    fn test_parse_backup_stamp() {
        assert_eq!(
            parse_backup_stamp("2024.12.31.23.59.59.999999999"),
            Some(at(2024, 12, 31, 23, 59, 59, 999_999_999))
        );
    }

    #[test]
    fn test_parse_rejects_foreign_suffixes() {
        assert_eq!(parse_backup_stamp("bak"), None);
        assert_eq!(parse_backup_stamp("2024.01.02"), None);
        assert_eq!(parse_backup_stamp("2024.1.2.3.4.5.6"), None);
        assert_eq!(parse_backup_stamp("2024.13.01.00.00.00.000000000"), None);
        assert_eq!(parse_backup_stamp("2024.02.30.00.00.00.000000000"), None);
        assert_eq!(parse_backup_stamp("2024.01.02.03.04.05.000000006.gz"), None);
        assert_eq!(parse_backup_stamp("2024.01.02.03.04.05.00000000x"), None);
    }

    #[test]
    fn test_backup_time_requires_dot_after_base() {
        let stamp = "2024.01.02.03.04.05.000000006";
        assert!(backup_time(&format!("app.log.{}", stamp), "app.log").is_some());
        assert!(backup_time(&format!("app.logx{}", stamp), "app.log").is_none());
        assert!(backup_time(&format!("app.log2.{}", stamp), "app.log").is_none());
        assert!(backup_time("app.log", "app.log").is_none());
        assert!(backup_time("app.log.old", "app.log").is_none());
    }

    fn datetime() -> impl Strategy<Value = NaiveDateTime> {
        (
            1970i32..=9999,
            1u32..=12,
            1u32..=28,
            0u32..24,
            0u32..60,
            0u32..60,
            0u32..1_000_000_000,
        )
            .prop_map(|(y, mo, d, h, mi, s, ns)| at(y, mo, d, h, mi, s, ns))
    }

    proptest! {
        #[test]
        fn prop_stamp_parses_back(time in datetime()) {
            prop_assert_eq!(parse_backup_stamp(&backup_stamp(time)), Some(time));
        }

        #[test]
        fn prop_lexical_order_is_chronological(a in datetime(), b in datetime()) {
            prop_assert_eq!(backup_stamp(a).cmp(&backup_stamp(b)), a.cmp(&b));
        }
    }
}
