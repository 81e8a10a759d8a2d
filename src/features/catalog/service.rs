use crate::features::catalog::models::{BusLine, Tariff, Vehicle};
use crate::shared::api_client::ApiClient;
use crate::shared::errors::{AppError, AppResult};
use std::sync::Arc;

/// 路線・運賃・車両のカタログサービス
///
/// キャッシュは持たず、常にサーバーから取得する
#[derive(Clone)]
pub struct CatalogService {
    api: Arc<ApiClient>,
}

impl CatalogService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// 路線一覧を取得する
    ///
    /// # 引数
    /// * `company_id` - 会社IDで絞り込む場合に指定
    pub async fn bus_lines(&self, company_id: Option<i64>) -> AppResult<Vec<BusLine>> {
        let endpoint = with_company_filter("/buslines/", company_id);
        let lines: Vec<BusLine> = self.api.get(&endpoint).await?;
        log::debug!("路線一覧を取得しました: count={}", lines.len());
        Ok(lines)
    }

    /// 路線を取得する（運賃一覧を含む）
    pub async fn bus_line(&self, id: i64) -> AppResult<BusLine> {
        self.api.get(&format!("/buslines/{id}/")).await
    }

    /// 運賃一覧を取得する
    pub async fn tariffs(&self) -> AppResult<Vec<Tariff>> {
        self.api.get("/tariffs/").await
    }

    /// 車両一覧を取得する
    pub async fn vehicles(&self, company_id: Option<i64>) -> AppResult<Vec<Vehicle>> {
        let endpoint = with_company_filter("/vehicles/", company_id);
        let vehicles: Vec<Vehicle> = self.api.get(&endpoint).await?;
        log::debug!("車両一覧を取得しました: count={}", vehicles.len());
        Ok(vehicles)
    }

    /// 車両番号で車両を取得する
    pub async fn vehicle(&self, prefix: &str) -> AppResult<Vehicle> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(AppError::validation("Informe o prefixo do veículo."));
        }
        self.api.get(&vehicle_endpoint(prefix)).await
    }
}

fn with_company_filter(base: &str, company_id: Option<i64>) -> String {
    match company_id {
        Some(company_id) => format!("{base}?company_id={company_id}"),
        None => base.to_string(),
    }
}

fn vehicle_endpoint(prefix: &str) -> String {
    format!("/vehicles/{}/", urlencoding::encode(prefix))
}
