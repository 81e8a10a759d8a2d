use crate::shared::errors::{AppError, AppResult};
use serde::{Deserialize, Deserializer};

pub mod currency;
pub mod date;

/// 必須フィールドのバリデーション
///
/// 空文字・空白のみの場合は指定メッセージのバリデーションエラー
pub fn validate_required_field(text: &str, message: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::validation(message));
    }
    Ok(())
}

/// 文字列の正規化（前後の空白を削除）
pub fn normalize_string(text: &str) -> String {
    text.trim().to_string()
}

/// 路線名を表示用に大文字化する（空の場合はフォールバック）
pub fn format_bus_line_name(name: Option<&str>, fallback: &str) -> String {
    match name {
        Some(name) if !name.trim().is_empty() => name.to_uppercase(),
        _ => fallback.to_string(),
    }
}

/// 画像ファイル名からMIMEタイプを推定する（拡張子がなければ image/jpeg）
pub fn image_mime_type(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            let ext = ext.to_ascii_lowercase();
            if ext == "jpg" {
                "image/jpeg".to_string()
            } else {
                format!("image/{ext}")
            }
        }
        _ => "image/jpeg".to_string(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientId {
    Number(i64),
    Text(String),
}

/// 数値または数値文字列のIDを受け付けるデシリアライザ
///
/// サーバーによって `user_id` が `7` と `"7"` のどちらでも返ってくるため
pub fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LenientId>::deserialize(deserializer)?;
    Ok(match value {
        Some(LenientId::Number(id)) => Some(id),
        Some(LenientId::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

/// 文字列または数値を文字列として受け付けるデシリアライザ
///
/// ジャーニーの決済行では路線・車両が名前でもIDでも返ってくるため
pub fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LenientId>::deserialize(deserializer)?;
    Ok(match value {
        Some(LenientId::Number(id)) => Some(id.to_string()),
        Some(LenientId::Text(text)) => Some(text),
        None => None,
    })
}

/// 文字列または数値のIDを文字列として受け付けるデシリアライザ（必須）
pub fn deserialize_text_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match LenientId::deserialize(deserializer)? {
        LenientId::Number(id) => id.to_string(),
        LenientId::Text(text) => text,
    })
}
