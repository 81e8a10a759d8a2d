/// 日時フォーマットユーティリティ（ブラジリア時間 America/Sao_Paulo）
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::America::Sao_Paulo;

/// サーバーのタイムスタンプ文字列を解析する
///
/// RFC3339（オフセット付き）を優先し、オフセットなしの場合はUTCとして扱う
pub fn parse_server_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// `DD/MM/YYYY às HH:MM` 形式にフォーマットする
pub fn format_date_to_brasilia(value: &DateTime<Utc>) -> String {
    value
        .with_timezone(&Sao_Paulo)
        .format("%d/%m/%Y às %H:%M")
        .to_string()
}

/// `DD/MM/YYYY` 形式にフォーマットする
pub fn format_date_only(value: &DateTime<Utc>) -> String {
    value.with_timezone(&Sao_Paulo).format("%d/%m/%Y").to_string()
}

/// `HH:MM` 形式にフォーマットする
pub fn format_time_only(value: &DateTime<Utc>) -> String {
    value.with_timezone(&Sao_Paulo).format("%H:%M").to_string()
}

/// 文字列のタイムスタンプをフォーマットする（解析できない場合は元の文字列）
pub fn format_timestamp_str(value: &str) -> String {
    parse_server_timestamp(value)
        .map(|dt| format_date_to_brasilia(&dt))
        .unwrap_or_else(|| value.to_string())
}

/// 現在日時をブラジリア時間でフォーマットする
pub fn current_brasilia_date_time() -> String {
    format_date_to_brasilia(&Utc::now())
}

/// ブラジリア時間での `YYYYMMDD`（ファイル名用）
pub fn compact_date(value: &DateTime<Utc>) -> String {
    value.with_timezone(&Sao_Paulo).format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_date_to_brasilia_shifts_three_hours() {
        let utc = Utc.with_ymd_and_hms(2025, 3, 10, 15, 7, 0).unwrap();
        assert_eq!(format_date_to_brasilia(&utc), "10/03/2025 às 12:07");
        assert_eq!(format_time_only(&utc), "12:07");
    }

    #[test]
    fn test_day_rollover() {
        // UTC 02:30 は前日の23:30
        let utc = Utc.with_ymd_and_hms(2025, 3, 1, 2, 30, 0).unwrap();
        assert_eq!(format_date_only(&utc), "28/02/2025");
        assert_eq!(format_date_to_brasilia(&utc), "28/02/2025 às 23:30");
        assert_eq!(compact_date(&utc), "20250228");
    }

    #[test]
    fn test_year_rollover() {
        let utc = Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap();
        assert_eq!(format_date_only(&utc), "31/12/2024");
    }

    #[test]
    fn test_parse_server_timestamp_variants() {
        let with_offset = parse_server_timestamp("2025-03-10T12:07:00-03:00").unwrap();
        assert_eq!(with_offset, Utc.with_ymd_and_hms(2025, 3, 10, 15, 7, 0).unwrap());

        let with_micros = parse_server_timestamp("2025-03-10T15:07:00.123456Z").unwrap();
        assert_eq!(with_micros.date_naive(), with_offset.date_naive());

        let naive = parse_server_timestamp("2025-03-10 15:07:00").unwrap();
        assert_eq!(naive, with_offset);

        assert!(parse_server_timestamp("ontem").is_none());
    }

    #[test]
    fn test_format_timestamp_str_falls_back_to_input() {
        assert_eq!(format_timestamp_str("inválido"), "inválido");
        assert_eq!(
            format_timestamp_str("2025-03-10T15:07:00Z"),
            "10/03/2025 às 12:07"
        );
    }
}
