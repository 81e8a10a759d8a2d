use crate::features::journeys::models::{
    CreateJourneyRequest, FinalizeResponse, Journey, JourneyPayment,
};
use crate::shared::api_client::ApiClient;
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

const JOURNEYS_ENDPOINT: &str = "/employee/journeys/";

/// ジャーニーAPIのポート
///
/// 同期処理をサーバーから切り離してテストできるようにする
#[async_trait]
pub trait JourneyApi: Send + Sync {
    /// ジャーニーを作成する
    async fn create(&self, request: &CreateJourneyRequest) -> AppResult<Journey>;

    /// ログイン中の社員の稼働中ジャーニー（なければ404）
    async fn active(&self) -> AppResult<Journey>;

    /// IDでジャーニーを取得する
    async fn get(&self, id: i64) -> AppResult<Journey>;

    /// ジャーニー一覧（終了済みフラグで絞り込み可能）
    async fn list(&self, finalizada: Option<bool>) -> AppResult<Vec<Journey>>;

    /// ジャーニーを終了する
    async fn finalize(&self, id: i64) -> AppResult<FinalizeResponse>;

    /// ジャーニーの決済一覧
    async fn payments(&self, id: i64) -> AppResult<Vec<JourneyPayment>>;

    /// ジャーニーのPDF（バイナリ）
    async fn download_pdf(&self, id: i64) -> AppResult<Vec<u8>>;
}

/// REST APIを使うジャーニーAPI
pub struct HttpJourneyApi {
    api: Arc<ApiClient>,
}

impl HttpJourneyApi {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl JourneyApi for HttpJourneyApi {
    async fn create(&self, request: &CreateJourneyRequest) -> AppResult<Journey> {
        self.api.post(JOURNEYS_ENDPOINT, request).await
    }

    async fn active(&self) -> AppResult<Journey> {
        self.api.get(&format!("{JOURNEYS_ENDPOINT}active/")).await
    }

    async fn get(&self, id: i64) -> AppResult<Journey> {
        self.api.get(&journey_endpoint(id, "")).await
    }

    async fn list(&self, finalizada: Option<bool>) -> AppResult<Vec<Journey>> {
        let endpoint = match finalizada {
            Some(finalizada) => format!("{JOURNEYS_ENDPOINT}?finalizada={finalizada}"),
            None => JOURNEYS_ENDPOINT.to_string(),
        };
        self.api.get_list(&endpoint).await
    }

    async fn finalize(&self, id: i64) -> AppResult<FinalizeResponse> {
        // 204で空ボディが返る場合も削除扱いにする
        let response: Option<FinalizeResponse> = self
            .api
            .post_empty(&journey_endpoint(id, "finalize/"))
            .await?;
        Ok(response.unwrap_or(FinalizeResponse::Deleted { detail: None }))
    }

    async fn payments(&self, id: i64) -> AppResult<Vec<JourneyPayment>> {
        self.api.get_list(&journey_endpoint(id, "payments/")).await
    }

    async fn download_pdf(&self, id: i64) -> AppResult<Vec<u8>> {
        self.api
            .get_bytes(&journey_endpoint(id, "download_pdf/"))
            .await
    }
}

fn journey_endpoint(id: i64, action: &str) -> String {
    format!("{JOURNEYS_ENDPOINT}{id}/{action}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::api_client::ListResponse;
    use serde_json::json;

    #[test]
    fn test_journey_endpoint() {
        assert_eq!(journey_endpoint(55, ""), "/employee/journeys/55/");
        assert_eq!(
            journey_endpoint(55, "finalize/"),
            "/employee/journeys/55/finalize/"
        );
        assert_eq!(
            journey_endpoint(55, "download_pdf/"),
            "/employee/journeys/55/download_pdf/"
        );
    }

    #[test]
    fn test_journey_lists_accept_arrays_and_pages() {
        let plain: ListResponse<Journey> =
            serde_json::from_value(json!([{"id": 55, "finalizada": true}])).unwrap();
        assert_eq!(plain.into_vec()[0].id, 55);

        let page: ListResponse<Journey> = serde_json::from_value(json!({
            "count": 2,
            "next": null,
            "results": [{"id": 55}, {"id": 56}]
        }))
        .unwrap();
        assert_eq!(page.into_vec().len(), 2);

        let payments: ListResponse<JourneyPayment> = serde_json::from_value(json!({
            "results": [{"id": 1, "quantidade": 2, "valor_total": "8.40", "payment_status": "aprovado"}]
        }))
        .unwrap();
        assert_eq!(payments.into_vec()[0].quantidade, 2);
    }
}
