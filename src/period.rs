//! ログファイルの期間を計算する。
//!
//! このモジュールの関数は、すべて入出力を伴わない純粋な関数である。

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;
use time::{
    format_description::BorrowedFormatItem, macros::format_description, Date, Duration,
    OffsetDateTime, PrimitiveDateTime, UtcOffset,
};

use crate::error::ConfigError;

/// ログエントリに記録する日時の書式
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const DAY_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const MONTH_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]");

const YEAR_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]");

/// ファイルを切り替えるタイミング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    /// 日付が変わったときにファイルを切り替え
    Daily,
    /// 日曜日を週の始まりとして、週が変わったときにファイルを切り替え
    Weekly,
    /// 月が変わったときにファイルを切り替え
    Monthly,
    /// 年が変わったときにファイルを切り替え
    Yearly,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Daily,
        Rotation::Weekly,
        Rotation::Monthly,
        Rotation::Yearly,
    ];

    /// ファイル名に埋め込む名前を返却する。
    pub fn as_str(&self) -> &'static str {
        match self {
            Rotation::Daily => "daily",
            Rotation::Weekly => "weekly",
            Rotation::Monthly => "monthly",
            Rotation::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rotation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rotation::ALL
            .into_iter()
            .find(|rotation| rotation.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownRotation(s.to_string()))
    }
}

/// 日時が属する期間のラベルを作成して返却する。
///
/// 同じ期間に属する日時は、必ず同じラベルになる。
///
/// # 引数
///
/// - timestamp: 日時。ラベルは`timestamp`のオフセットにおける暦で計算する。
/// - rotation: ファイルを切り替えるタイミング。
///
/// # 戻り値
///
/// 期間のラベル。日毎と週毎は`YYYY-MM-DD`、月毎は`YYYY-MM`、年毎は`YYYY`。
/// 週毎の場合は、その週の日曜日の日付になる。
pub fn period_label(timestamp: &OffsetDateTime, rotation: Rotation) -> String {
    let date = timestamp.date();
    match rotation {
        Rotation::Daily => format_date(date, DAY_FORMAT),
        Rotation::Weekly => {
            let days = i64::from(date.weekday().number_days_from_sunday());
            let sunday = date.checked_sub(Duration::days(days)).unwrap_or(Date::MIN);
            format_date(sunday, DAY_FORMAT)
        }
        Rotation::Monthly => format_date(date, MONTH_FORMAT),
        Rotation::Yearly => format_date(date, YEAR_FORMAT),
    }
}

/// ログファイルパスを作成して返却する。
///
/// ログファイル名は、`{base_name}-{rotation}-{期間のラベル}.log`となる。
///
/// # 引数
///
/// - directory: ファイルを作成するディレクトリ。
/// - base_name: 拡張子を除いたファイル名。
/// - rotation: ファイルを切り替えるタイミング。
/// - timestamp: 日時。
///
/// # 戻り値
///
/// ログファイルパス。
pub fn log_file_path(
    directory: &Path,
    base_name: &str,
    rotation: Rotation,
    timestamp: &OffsetDateTime,
) -> PathBuf {
    let label = period_label(timestamp, rotation);
    directory.join(log_file_name(base_name, rotation, &label, 0))
}

/// 期間のラベルからログファイル名を作成して返却する。
///
/// `sequence`が0より大きいとき、同じ期間のファイルと衝突しないように、
/// `{base_name}-{rotation}-{label}.{sequence}.log`とする。
pub(crate) fn log_file_name(
    base_name: &str,
    rotation: Rotation,
    label: &str,
    sequence: u32,
) -> String {
    if sequence == 0 {
        format!("{}-{}-{}.log", base_name, rotation, label)
    } else {
        format!("{}-{}-{}.{}.log", base_name, rotation, label, sequence)
    }
}

/// 日時を`YYYY-MM-DD HH:mm:ss`形式の文字列にする。
pub fn format_timestamp(timestamp: &OffsetDateTime) -> String {
    timestamp
        .format(TIMESTAMP_FORMAT)
        .expect("Unable to format OffsetDateTime; this is a bug in logit-pro")
}

/// `YYYY-MM-DD HH:mm:ss`形式の文字列を、`offset`の日時として解析する。
///
/// 解析できない場合は`None`を返却する。
pub fn parse_timestamp(s: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    let datetime = PrimitiveDateTime::parse(s, TIMESTAMP_FORMAT).ok()?;

    Some(datetime.assume_offset(offset))
}

fn format_date(date: Date, format: &[BorrowedFormatItem<'_>]) -> String {
    date.format(format)
        .expect("Unable to format Date; this is a bug in logit-pro")
}

#[cfg(test)]
mod tests {
    use time::{Month, Time};

    use super::*;

    fn at(year: i32, month: Month, day: u8, hour: u8) -> OffsetDateTime {
        Date::from_calendar_date(year, month, day)
            .unwrap()
            .with_time(Time::from_hms(hour, 0, 0).unwrap())
            .assume_offset(UtcOffset::from_hms(9, 0, 0).unwrap())
    }

    #[test]
    fn test_daily_label() {
        let ts = at(2025, Month::July, 7, 15);
        assert_eq!("2025-07-07", period_label(&ts, Rotation::Daily));
        assert_eq!(
            period_label(&ts, Rotation::Daily),
            period_label(&ts, Rotation::Daily)
        );
    }

    #[test]
    fn test_weekly_label_is_anchored_on_sunday() {
        // 2025-07-13 is a Sunday and 2025-07-19 the following Saturday.
        for day in 13..=19 {
            let ts = at(2025, Month::July, day, 23);
            assert_eq!("2025-07-13", period_label(&ts, Rotation::Weekly));
        }
        let next_sunday = at(2025, Month::July, 20, 0);
        assert_eq!("2025-07-20", period_label(&next_sunday, Rotation::Weekly));
        let previous_saturday = at(2025, Month::July, 12, 23);
        assert_eq!(
            "2025-07-06",
            period_label(&previous_saturday, Rotation::Weekly)
        );
    }

    #[test]
    fn test_weekly_label_across_year_boundary() {
        let ts = at(2025, Month::January, 1, 8);
        assert_eq!("2024-12-29", period_label(&ts, Rotation::Weekly));
    }

    #[test]
    fn test_monthly_and_yearly_labels() {
        let first = at(2025, Month::February, 1, 0);
        let last = at(2025, Month::February, 28, 23);
        assert_eq!("2025-02", period_label(&first, Rotation::Monthly));
        assert_eq!(
            period_label(&first, Rotation::Monthly),
            period_label(&last, Rotation::Monthly)
        );
        assert_eq!("2025", period_label(&first, Rotation::Yearly));
        assert_eq!(
            "2025",
            period_label(&at(2025, Month::December, 31, 23), Rotation::Yearly)
        );
    }

    #[test]
    fn test_log_file_path() {
        let ts = at(2025, Month::July, 17, 10);
        let path = log_file_path(Path::new("logs"), "app", Rotation::Daily, &ts);
        assert_eq!(Path::new("logs").join("app-daily-2025-07-17.log"), path);

        let path = log_file_path(Path::new("logs"), "app", Rotation::Monthly, &ts);
        assert_eq!(Path::new("logs").join("app-monthly-2025-07.log"), path);
    }

    #[test]
    fn test_log_file_name_with_sequence() {
        assert_eq!(
            "app-daily-2025-07-16.2.log",
            log_file_name("app", Rotation::Daily, "2025-07-16", 2)
        );
    }

    #[test]
    fn test_timestamp_round_trip() {
        let ts = at(2025, Month::July, 17, 9).replace_second(5).unwrap();
        let text = format_timestamp(&ts);
        assert_eq!("2025-07-17 09:00:05", text);
        assert_eq!(Some(ts), parse_timestamp(&text, ts.offset()));
        assert_eq!(None, parse_timestamp("yesterday", ts.offset()));
    }

    #[test]
    fn test_parse_rotation() {
        assert_eq!(Rotation::Weekly, "weekly".parse().unwrap());
        assert!("hourly".parse::<Rotation>().is_err());
    }
}
