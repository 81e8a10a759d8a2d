use crate::shared::utils::currency::format_decimal_with_symbol;
use crate::shared::utils::format_bus_line_name;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 運賃
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub id: i64,
    /// 金額（サーバーからは "4.20" のような文字列で届く）
    pub value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Tariff {
    /// 表示用ラベル（名前がなければ金額）
    pub fn label(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format_decimal_with_symbol(self.value),
        }
    }
}

/// 路線（運賃一覧を含む）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusLine {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub busline_code: String,
    #[serde(default)]
    pub company: Option<i64>,
    #[serde(default)]
    pub tariffs: Vec<Tariff>,
}

impl BusLine {
    /// 一覧表示用の路線名（大文字）
    pub fn display_name(&self) -> String {
        format_bus_line_name(Some(&self.name), &self.busline_code)
    }

    /// 路線名・路線コードによる絞り込み（大文字小文字を区別しない）
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.busline_code.to_lowercase().contains(&query)
    }
}

/// 車両
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// 車両番号（プレフィックス）
    pub prefix: String,
    #[serde(default)]
    pub company: Option<i64>,
}

impl Vehicle {
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty() || self.prefix.to_lowercase().contains(&query)
    }
}
