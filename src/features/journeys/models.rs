use crate::shared::utils::currency::format_decimal_with_symbol;
use crate::shared::utils::date::{compact_date, format_timestamp_str, parse_server_timestamp};
use crate::shared::utils::{deserialize_optional_id, deserialize_optional_text};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// ジャーニー（乗務シフト）
///
/// 合計金額や決済件数はサーバー側の集計値で、クライアントでは計算しない
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub id: i64,
    /// 担当社員のID
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub user: Option<i64>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub bus_line: Option<i64>,
    #[serde(default)]
    pub bus_line_name: Option<String>,
    #[serde(default)]
    pub bus_line_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub vehicle: Option<i64>,
    #[serde(default)]
    pub vehicle_prefix: Option<String>,
    /// 合計金額
    #[serde(default)]
    pub total_amount: Decimal,
    /// 終了済みフラグ（trueになったら戻らない）
    #[serde(default)]
    pub finalizada: bool,
    #[serde(default)]
    pub opened_hours: Option<String>,
    #[serde(default)]
    pub opened_hours_display: Option<String>,
    #[serde(default)]
    pub payments_count: u32,
    /// サーバー側で生成されたPDFのURL
    #[serde(default)]
    pub pdf: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub finalized_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Journey {
    /// 稼働中かどうか
    pub fn is_active(&self) -> bool {
        !self.finalizada
    }

    /// `R$ X,XX` 形式の合計金額
    pub fn total_display(&self) -> String {
        format_decimal_with_symbol(self.total_amount)
    }

    /// 開始日時（ブラジリア時間）
    pub fn started_at_display(&self) -> Option<String> {
        self.created_at.as_deref().map(format_timestamp_str)
    }

    /// 終了日時（ブラジリア時間）
    pub fn finalized_at_display(&self) -> Option<String> {
        self.finalized_at.as_deref().map(format_timestamp_str)
    }

    /// PDFの保存ファイル名（`jornada_<id>_<YYYYMMDD>.pdf`）
    ///
    /// 日付は終了日時、解析できなければ `now` を使う
    pub fn pdf_file_name(&self, now: DateTime<Utc>) -> String {
        let date = self
            .finalized_at
            .as_deref()
            .and_then(parse_server_timestamp)
            .unwrap_or(now);
        format!("jornada_{}_{}.pdf", self.id, compact_date(&date))
    }
}

/// ジャーニー作成リクエスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJourneyRequest {
    pub bus_line: i64,
    pub vehicle_prefix: String,
}

/// ジャーニーに含まれる決済
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyPayment {
    pub id: i64,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub bus_line: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub vehicle: Option<String>,
    #[serde(default)]
    pub quantidade: u32,
    #[serde(default)]
    pub valor_total: Decimal,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// 終了APIのレスポンス
///
/// 決済が1件もないジャーニーはサーバー側で削除され、`{detail}` だけが返る
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FinalizeResponse {
    Retained(Journey),
    Deleted {
        #[serde(default)]
        detail: Option<String>,
    },
}

/// ジャーニー終了の結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    /// 終了済みとして履歴に残った（詳細画面へ遷移する）
    Finalized { journey: Journey },
    /// 決済がなかったため削除された（表示するものはない）
    Deleted { detail: Option<String> },
}

impl FinalizeOutcome {
    /// 遷移先のジャーニー（削除された場合はNone）
    pub fn journey(&self) -> Option<&Journey> {
        match self {
            FinalizeOutcome::Finalized { journey } => Some(journey),
            FinalizeOutcome::Deleted { .. } => None,
        }
    }
}

impl From<FinalizeResponse> for FinalizeOutcome {
    fn from(response: FinalizeResponse) -> Self {
        match response {
            FinalizeResponse::Retained(journey) => FinalizeOutcome::Finalized { journey },
            FinalizeResponse::Deleted { detail } => FinalizeOutcome::Deleted { detail },
        }
    }
}

/// ジャーニー詳細（ジャーニーと決済一覧）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyDetail {
    pub journey: Journey,
    pub payments: Vec<JourneyPayment>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// テスト用のジャーニー
    pub fn journey(id: i64, finalizada: bool) -> Journey {
        Journey {
            id,
            user: Some(3),
            user_name: Some("Araujo".to_string()),
            bus_line: Some(10),
            bus_line_name: Some("Centro".to_string()),
            bus_line_code: Some("101".to_string()),
            vehicle: Some(7),
            vehicle_prefix: Some("ABC123".to_string()),
            total_amount: Decimal::ZERO,
            finalizada,
            opened_hours: None,
            opened_hours_display: None,
            payments_count: 0,
            pdf: None,
            created_at: Some("2025-03-10T11:00:00Z".to_string()),
            finalized_at: None,
            updated_at: None,
        }
    }
}
