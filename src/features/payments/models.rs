use crate::features::catalog::models::Tariff;
use crate::features::selection::models::BusSelection;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::currency::format_decimal_with_symbol;
use crate::shared::utils::{deserialize_optional_id, deserialize_optional_text, deserialize_text_id};
use base64::{engine::general_purpose, Engine as _};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// 数量の上限
pub const MAX_QUANTITY: u32 = 99;

/// 決済の通貨
pub const CURRENCY_ID: &str = "BRL";

/// 決済完了後にアプリへ戻るためのURL
pub const FRONT_URL: &str = "pagbusmobile://";

/// 決済ステータス
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Approved,
    Cancelled,
    /// サーバーが返した未知のステータス
    Other(String),
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "pendente" | "pending" => PaymentStatus::Pending,
            "aprovado" | "approved" => PaymentStatus::Approved,
            "cancelado" | "cancelled" | "canceled" => PaymentStatus::Cancelled,
            _ => PaymentStatus::Other(value.to_string()),
        }
    }

    /// サーバーの表記
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pendente",
            PaymentStatus::Approved => "aprovado",
            PaymentStatus::Cancelled => "cancelado",
            PaymentStatus::Other(value) => value,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, PaymentStatus::Approved)
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        PaymentStatus::parse(&value)
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

/// 取引のメタデータ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 取引（ステータス確認のレスポンス）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStatus {
    #[serde(deserialize_with = "deserialize_text_id")]
    pub id: String,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub preference_id: Option<String>,
    #[serde(default)]
    pub pagamento_url: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub journey: Option<i64>,
    #[serde(default)]
    pub metadata: Option<TransactionMetadata>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl TransactionStatus {
    /// 取引の所有者（`metadata.user_id` を優先し、なければトップレベルの `user_id`）
    pub fn owner_user_id(&self) -> Option<i64> {
        self.metadata
            .as_ref()
            .and_then(|m| m.user_id)
            .or(self.user_id)
    }
}

/// 取引の所有者がログイン中のユーザーかを確認する
///
/// 両方あって一致しない場合と、取引に所有者がいてセッションにユーザーがない場合は不一致。
/// どちらとも判断できない場合は通す。
pub fn verify_ownership(
    transaction_user_id: Option<i64>,
    session_user_id: Option<i64>,
) -> AppResult<()> {
    match (transaction_user_id, session_user_id) {
        (Some(owner), Some(current)) if owner != current => Err(AppError::OwnershipMismatch {
            transaction_user_id: owner,
            session_user_id: Some(current),
        }),
        (Some(owner), None) => Err(AppError::OwnershipMismatch {
            transaction_user_id: owner,
            session_user_id: None,
        }),
        _ => Ok(()),
    }
}

/// 決済の明細
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentItem {
    pub title: String,
    pub quantity: u32,
    /// 単価（サーバーには数値で送る）
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub currency_id: String,
}

/// 決済作成リクエスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub company_id: i64,
    pub items: Vec<PaymentItem>,
    pub external_reference: String,
    pub front_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_line_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_line_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journey_id: Option<i64>,
}

/// 決済作成レスポンス
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentResponse {
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub qr_code_base64: Option<String>,
    #[serde(default)]
    pub copy_paste: Option<String>,
    pub transaction: TransactionStatus,
}

/// 決済画面から成功画面へ引き継ぐ情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentContext {
    /// 例: `2x Tarifa R$ 4,20`
    pub tariff_name: String,
    /// 合計金額（例: `8.4`）
    pub tariff_value: String,
    pub transaction_id: String,
    pub bus_line_id: String,
    pub bus_line_name: String,
    pub bus_line_code: String,
    pub vehicle_prefix: String,
    #[serde(default)]
    pub journey_id: Option<i64>,
}

/// QRコード表示画面のデータ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetail {
    pub context: PaymentContext,
    /// QRコードに埋め込む文字列
    pub qr_code_data: String,
    /// サーバーが生成したQRコード画像（Base64）
    #[serde(default)]
    pub qr_code_base64: Option<String>,
    /// PIXコピー＆ペースト用コード
    pub copy_paste: String,
    /// PIX決済ページのURL
    pub pix_link: String,
}

impl PaymentDetail {
    /// 作成レスポンスから表示データを組み立てる
    ///
    /// 欠けている値は `qr_code` → `pagamento_url` のように代替値で埋める
    pub fn from_response(response: PaymentResponse, context: PaymentContext) -> Self {
        let pagamento_url = response.transaction.pagamento_url.clone();
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let qr_code = non_empty(response.qr_code);
        let qr_code_data = qr_code
            .clone()
            .or_else(|| non_empty(pagamento_url.clone()))
            .unwrap_or_default();
        let copy_paste = non_empty(response.copy_paste)
            .or(qr_code)
            .unwrap_or_default();
        let pix_link = non_empty(response.redirect_url)
            .or_else(|| non_empty(pagamento_url))
            .unwrap_or_default();

        Self {
            context,
            qr_code_data,
            qr_code_base64: non_empty(response.qr_code_base64),
            copy_paste,
            pix_link,
        }
    }

    /// QRコード画像（PNG）をデコードする
    ///
    /// `data:image/png;base64,` 形式のプレフィックスは取り除く
    pub fn qr_code_png(&self) -> AppResult<Option<Vec<u8>>> {
        let Some(encoded) = self.qr_code_base64.as_deref() else {
            return Ok(None);
        };
        let encoded = encoded
            .split_once("base64,")
            .map(|(_, data)| data)
            .unwrap_or(encoded)
            .trim();

        general_purpose::STANDARD
            .decode(encoded)
            .map(Some)
            .map_err(|e| AppError::validation(format!("QRコード画像のデコードに失敗しました: {e}")))
    }
}

/// 決済承認時に成功画面へ渡す情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSuccess {
    pub context: PaymentContext,
    /// 承認時点の取引
    pub transaction: TransactionStatus,
    /// 承認を確認した日時（ブラジリア時間）
    pub confirmed_at: String,
}

/// 決済の入力内容（選択中の路線・車両、運賃、数量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub selection: BusSelection,
    pub tariff: Tariff,
    quantity: u32,
}

impl PaymentDraft {
    /// 数量は1〜99に丸める
    pub fn new(selection: BusSelection, tariff: Tariff, quantity: u32) -> Self {
        Self {
            selection,
            tariff,
            quantity: quantity.clamp(1, MAX_QUANTITY),
        }
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// 数量を1増やす（上限を超えない）
    pub fn increment(&mut self) {
        self.quantity = (self.quantity + 1).min(MAX_QUANTITY);
    }

    /// 数量を1減らす（1未満にならない）
    pub fn decrement(&mut self) {
        self.quantity = self.quantity.saturating_sub(1).max(1);
    }

    /// 合計金額
    pub fn total(&self) -> Decimal {
        (self.tariff.value * Decimal::from(self.quantity)).normalize()
    }

    /// 表示用の運賃名（例: `2x Tarifa R$ 4,20`）
    pub fn tariff_name(&self) -> String {
        format!(
            "{}x Tarifa {}",
            self.quantity,
            format_decimal_with_symbol(self.tariff.value)
        )
    }

    /// 決済明細のタイトル
    pub fn item_title(&self) -> String {
        format!(
            "{} - {} ({}) - {}",
            self.tariff_name(),
            self.selection.bus_line_name,
            self.selection.bus_line_code,
            self.selection.vehicle_prefix
        )
    }

    /// 決済作成リクエストを組み立てる
    ///
    /// # 引数
    /// * `company_id` - 所属会社ID
    /// * `user_id` - ログイン中のユーザーID
    /// * `journey_id` - 稼働中のジャーニーID
    /// * `reference_millis` - 外部参照番号に使うUNIXミリ秒
    pub fn to_request(
        &self,
        company_id: i64,
        user_id: Option<i64>,
        journey_id: Option<i64>,
        reference_millis: i64,
    ) -> PaymentRequest {
        let non_empty = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        PaymentRequest {
            company_id,
            items: vec![PaymentItem {
                title: self.item_title(),
                quantity: self.quantity,
                unit_price: self.tariff.value,
                currency_id: CURRENCY_ID.to_string(),
            }],
            external_reference: format!("ref_{reference_millis}"),
            front_url: FRONT_URL.to_string(),
            bus_line_name: non_empty(&self.selection.bus_line_name),
            bus_line_id: non_empty(&self.selection.bus_line_id),
            vehicle_prefix: non_empty(&self.selection.vehicle_prefix),
            user_id,
            journey_id,
        }
    }

    /// 成功画面へ引き継ぐ情報
    pub fn context(&self, transaction_id: &str, journey_id: Option<i64>) -> PaymentContext {
        PaymentContext {
            tariff_name: self.tariff_name(),
            tariff_value: self.total().to_string(),
            transaction_id: transaction_id.to_string(),
            bus_line_id: self.selection.bus_line_id.clone(),
            bus_line_name: self.selection.bus_line_name.clone(),
            bus_line_code: self.selection.bus_line_code.clone(),
            vehicle_prefix: self.selection.vehicle_prefix.clone(),
            journey_id,
        }
    }
}

/// 無賃乗車（グラトゥイダーデ）の写真アップロード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GratuidadeUpload {
    pub company_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub journey_id: Option<i64>,
    #[serde(default)]
    pub bus_line_id: Option<String>,
    #[serde(default)]
    pub vehicle_prefix: Option<String>,
    /// 撮影した写真のパス
    pub image_path: PathBuf,
}

impl GratuidadeUpload {
    /// 送信時のファイル名（パスの末尾、なければ `photo.jpg`）
    pub fn file_name(&self) -> String {
        self.image_path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("photo.jpg")
            .to_string()
    }

    /// 文字列フィールド（空の値は送らない）
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("company_id", self.company_id.to_string())];
        if let Some(user_id) = self.user_id {
            fields.push(("user_id", user_id.to_string()));
        }
        if let Some(journey_id) = self.journey_id {
            fields.push(("journey_id", journey_id.to_string()));
        }
        if let Some(bus_line_id) = self.bus_line_id.as_deref().filter(|v| !v.is_empty()) {
            fields.push(("bus_line_id", bus_line_id.to_string()));
        }
        if let Some(prefix) = self.vehicle_prefix.as_deref().filter(|v| !v.is_empty()) {
            fields.push(("vehicle_prefix", prefix.to_string()));
        }
        fields
    }
}

/// 取引履歴の1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionHistoryEntry {
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub bus_line_name: Option<String>,
    #[serde(default)]
    pub vehicle_prefix: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// 画面で使わない項目
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
