use crate::features::payments::models::TransactionStatus;
use crate::shared::api_client::ApiClient;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

/// 取引ステータスの取得元
///
/// ポーリングをサーバーから切り離してテストできるようにする
#[async_trait]
pub trait TransactionStatusSource: Send + Sync {
    async fn transaction_status(&self, transaction_id: &str) -> AppResult<TransactionStatus>;
}

/// REST APIから取引ステータスを取得する
pub struct HttpTransactionStatusSource {
    api: Arc<ApiClient>,
}

impl HttpTransactionStatusSource {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl TransactionStatusSource for HttpTransactionStatusSource {
    async fn transaction_status(&self, transaction_id: &str) -> AppResult<TransactionStatus> {
        self.api.get(&transaction_endpoint(transaction_id, "")).await
    }
}

/// 取引エンドポイント（IDはURLエンコードする）
pub(crate) fn transaction_endpoint(transaction_id: &str, action: &str) -> String {
    format!(
        "/payment/transactions/{}/{action}",
        urlencoding::encode(transaction_id.trim())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_endpoint() {
        assert_eq!(
            transaction_endpoint("123", ""),
            "/payment/transactions/123/"
        );
        assert_eq!(
            transaction_endpoint("123", "get_payment_link/"),
            "/payment/transactions/123/get_payment_link/"
        );
    }
}
