/// 金額フォーマットユーティリティ（ブラジルレアル表記）
use rust_decimal::Decimal;
use std::str::FromStr;

/// 金額を `X,XX` 形式にフォーマットする
///
/// 解析できない値や空文字は `0,00` になる
pub fn format_currency(value: &str) -> String {
    match parse_amount(value) {
        Some(amount) => format_decimal(amount),
        None => "0,00".to_string(),
    }
}

/// Decimalを `X,XX` 形式にフォーマットする
pub fn format_decimal(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2)).replace('.', ",")
}

/// `R$ X,XX` 形式にフォーマットする
pub fn format_currency_with_symbol(value: &str) -> String {
    format!("R$ {}", format_currency(value))
}

/// Decimalを `R$ X,XX` 形式にフォーマットする
pub fn format_decimal_with_symbol(amount: Decimal) -> String {
    format!("R$ {}", format_decimal(amount))
}

/// `X,XX` 形式の文字列を数値に変換する（失敗時は0）
pub fn parse_currency(value: &str) -> Decimal {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.trim_start_matches("R$").replacen(',', ".", 1);
    Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
}

/// サーバーから受け取った金額文字列（`8.40` 形式）を解析する
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}
