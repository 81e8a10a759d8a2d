/// 汎用APIクライアント
///
/// PagBus APIサーバーとの通信を行う。すべての認証付きリクエストに
/// `Authorization: Bearer {access}` を付与し、401を受け取った場合は
/// 一度だけリフレッシュトークンで再認証してリトライする。
/// 再認証後も401の場合はセッション情報を削除して `AppError::Auth` を返す。
use crate::shared::config::environment::ApiConfig;
use crate::shared::errors::{AppError, AppResult, SESSION_EXPIRED_MESSAGE};
use crate::shared::secure_storage::{SecureStorageKeys, SecureStore};
use log::{debug, info, warn};
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// トークンリフレッシュのリクエスト
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// トークンリフレッシュのレスポンス
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: Option<String>,
    /// ローテーションが有効な場合のみ返される
    refresh: Option<String>,
}

/// 一覧APIのレスポンス（配列、またはページング形式）
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    List(Vec<T>),
    Page { results: Vec<T> },
}

impl<T> ListResponse<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::List(items) => items,
            ListResponse::Page { results } => results,
        }
    }
}

/// 汎用APIクライアント
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
    store: Arc<dyn SecureStore>,
}

impl ApiClient {
    /// 設定を指定してAPIクライアントを作成
    ///
    /// 設定の検証は起動時（`AppState::initialize`）に済ませておく
    pub fn new(mut config: ApiConfig, store: Arc<dyn SecureStore>) -> AppResult<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::configuration(format!("HTTPクライアント初期化失敗: {e}")))?;

        info!("APIクライアントを初期化しました: base_url={}", config.base_url);

        Ok(Self {
            client,
            config,
            store,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.config.base_url)
    }

    /// GETリクエストを送信（ネットワークエラー時はリトライ）
    pub async fn get<T>(&self, endpoint: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        debug!("GETリクエスト送信: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = self
            .send_authorized(
                |token| Ok(with_bearer(self.client.get(&url), token)),
                self.config.max_retries,
                "GET",
                endpoint,
            )
            .await?;

        parse_json(response, "GET", endpoint).await
    }

    /// 一覧APIにGETリクエストを送信する（配列・ページング形式の両方に対応）
    pub async fn get_list<T>(&self, endpoint: &str) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let response: ListResponse<T> = self.get(endpoint).await?;
        Ok(response.into_vec())
    }

    /// GETリクエストを送信し、レスポンスをバイト列で受け取る（PDFなど）
    pub async fn get_bytes(&self, endpoint: &str) -> AppResult<Vec<u8>> {
        info!("バイナリGETリクエスト送信: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = self
            .send_authorized(
                |token| Ok(with_bearer(self.client.get(&url), token)),
                self.config.max_retries,
                "GET",
                endpoint,
            )
            .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::network(format!("レスポンス読み取りエラー: {e}")))?;

        info!(
            "バイナリGETリクエスト成功: endpoint={endpoint}, size={}",
            bytes.len()
        );
        Ok(bytes.to_vec())
    }

    /// POSTリクエストを送信
    ///
    /// 副作用のあるリクエストなのでネットワークエラー時もリトライしない
    pub async fn post<B, T>(&self, endpoint: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        info!("POSTリクエスト送信: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = self
            .send_authorized(
                |token| Ok(with_bearer(self.client.post(&url).json(body), token)),
                0,
                "POST",
                endpoint,
            )
            .await?;

        parse_json(response, "POST", endpoint).await
    }

    /// ボディなしのPOSTリクエストを送信
    pub async fn post_empty<T>(&self, endpoint: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        info!("POSTリクエスト送信（ボディなし）: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = self
            .send_authorized(
                |token| Ok(with_bearer(self.client.post(&url), token)),
                0,
                "POST",
                endpoint,
            )
            .await?;

        parse_json(response, "POST", endpoint).await
    }

    /// 認証なしのPOSTリクエストを送信（ログインなど）
    ///
    /// 401はそのままリクエストエラーとして返し、リフレッシュは行わない
    pub async fn post_public<B, T>(&self, endpoint: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        info!("認証なしPOSTリクエスト送信: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = send_with_retry(self.client.post(&url).json(body), 0).await?;
        let response = ensure_success(response).await?;

        parse_json(response, "POST", endpoint).await
    }

    /// multipart/form-data のPOSTリクエストを送信
    ///
    /// フォームはリトライ時に作り直すためクロージャで受け取る
    pub async fn post_multipart<T, F>(&self, endpoint: &str, build_form: F) -> AppResult<T>
    where
        T: DeserializeOwned,
        F: Fn() -> AppResult<multipart::Form>,
    {
        info!("multipart POSTリクエスト送信: endpoint={endpoint}");

        let url = self.url(endpoint);
        let response = self
            .send_authorized(
                |token| {
                    let form = build_form()?;
                    Ok(with_bearer(self.client.post(&url).multipart(form), token))
                },
                0,
                "POST",
                endpoint,
            )
            .await?;

        parse_json(response, "POST", endpoint).await
    }

    /// 認証付きでリクエストを送信し、401なら一度だけ再認証してリトライする
    async fn send_authorized<F>(
        &self,
        build: F,
        retries: u32,
        method: &str,
        endpoint: &str,
    ) -> AppResult<Response>
    where
        F: Fn(Option<&str>) -> AppResult<RequestBuilder>,
    {
        let token = self.stored_access_token();
        let response = send_with_retry(build(token.as_deref())?, retries).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return ensure_success(response).await;
        }

        warn!("401を受信しました。トークンのリフレッシュを試みます: {method} {endpoint}");

        let Some(new_token) = self.refresh_access_token().await else {
            self.expire_session();
            return Err(AppError::Auth(SESSION_EXPIRED_MESSAGE.to_string()));
        };

        let retried = send_with_retry(build(Some(&new_token))?, retries).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("再認証後も401を受信しました。セッションを破棄します: {method} {endpoint}");
            self.expire_session();
            return Err(AppError::Auth(SESSION_EXPIRED_MESSAGE.to_string()));
        }

        ensure_success(retried).await
    }

    fn stored_access_token(&self) -> Option<String> {
        match self.store.get(SecureStorageKeys::AUTH_TOKEN) {
            Ok(token) => token,
            Err(e) => {
                warn!("アクセストークンの読み込みに失敗しました: {e}");
                None
            }
        }
    }

    /// リフレッシュトークンで新しいアクセストークンを取得する
    ///
    /// 失敗した場合はNoneを返す（呼び出し側でセッションを破棄する）
    async fn refresh_access_token(&self) -> Option<String> {
        let refresh_token = match self.store.get(SecureStorageKeys::REFRESH_TOKEN) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("リフレッシュトークンが保存されていません");
                return None;
            }
            Err(e) => {
                warn!("リフレッシュトークンの読み込みに失敗しました: {e}");
                return None;
            }
        };

        let url = self.config.token_refresh_url();
        let response = match self
            .client
            .post(&url)
            .json(&RefreshRequest {
                refresh: &refresh_token,
            })
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!("トークンリフレッシュが拒否されました: status={}", response.status());
                return None;
            }
            Err(e) => {
                warn!("トークンリフレッシュ要求に失敗しました: {e}");
                return None;
            }
        };

        let body: RefreshResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("トークンリフレッシュのレスポンス解析に失敗しました: {e}");
                return None;
            }
        };

        let access = body.access?;
        if let Err(e) = self.store.set(SecureStorageKeys::AUTH_TOKEN, &access) {
            warn!("新しいアクセストークンの保存に失敗しました: {e}");
        }
        if let Some(refresh) = body.refresh {
            if let Err(e) = self.store.set(SecureStorageKeys::REFRESH_TOKEN, &refresh) {
                warn!("新しいリフレッシュトークンの保存に失敗しました: {e}");
            }
        }

        info!("アクセストークンをリフレッシュしました");
        Some(access)
    }

    fn expire_session(&self) {
        if let Err(e) = self.store.delete_many(&SecureStorageKeys::SESSION_KEYS) {
            warn!("セッション情報の削除に失敗しました: {e}");
        }
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// リトライ機能付きでリクエストを送信（サーバーに到達できなかった場合のみリトライ）
async fn send_with_retry(request: RequestBuilder, retries: u32) -> AppResult<Response> {
    if retries == 0 {
        return request.send().await.map_err(network_error);
    }

    let mut attempts = 0;
    loop {
        let Some(cloned_request) = request.try_clone() else {
            return request.send().await.map_err(network_error);
        };

        match cloned_request.send().await {
            Ok(response) => return Ok(response),
            Err(e) if attempts < retries => {
                attempts += 1;
                let delay = Duration::from_secs(2_u64.pow(attempts));
                warn!("APIリクエスト失敗、リトライします: attempt={attempts}/{retries}, delay={delay:?}, error={e}");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(network_error(e)),
        }
    }
}

fn network_error(error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::network(format!("APIサーバーからの応答がタイムアウトしました: {error}"))
    } else {
        AppError::network(format!("APIサーバーへの接続に失敗しました: {error}"))
    }
}

async fn ensure_success(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::new());

    warn!("APIサーバーからエラーレスポンス: status={status}, body={body}");
    Err(parse_error_body(status.as_u16(), &body))
}

async fn parse_json<T>(response: Response, method: &str, endpoint: &str) -> AppResult<T>
where
    T: DeserializeOwned,
{
    let text = response
        .text()
        .await
        .map_err(|e| AppError::network(format!("レスポンス読み取りエラー: {e}")))?;

    // 204などボディが空の場合はnullとして解釈する
    let text = if text.trim().is_empty() { "null" } else { &text };

    let result = serde_json::from_str(text).map_err(|e| {
        warn!("レスポンス解析エラー: {method} {endpoint}: {e}");
        AppError::Json(e)
    })?;

    debug!("{method}リクエスト成功: endpoint={endpoint}");
    Ok(result)
}

/// エラーレスポンスのボディを `AppError::Request` に変換する
///
/// メッセージは `message` → `detail` → ステータスごとの汎用文言の順で選ぶ
pub fn parse_error_body(status: u16, body: &str) -> AppError {
    let data = serde_json::from_str::<Value>(body).ok();

    let message = data
        .as_ref()
        .and_then(|d| {
            ["message", "detail", "error"]
                .iter()
                .find_map(|key| d.get(*key).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| default_status_message(status).to_string());

    AppError::request(status, message, data)
}

fn default_status_message(status: u16) -> &'static str {
    match status {
        400 => "Requisição inválida",
        401 => "Não autorizado. Faça login novamente.",
        403 => "Você não tem permissão para esta operação",
        404 => "Recurso não encontrado",
        429 => "Muitas requisições. Aguarde e tente novamente.",
        500..=599 => "Erro no servidor. Tente novamente mais tarde.",
        _ => crate::shared::errors::GENERIC_REQUEST_ERROR_MESSAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::secure_storage::MemorySecureStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn test_parse_error_body_prefers_message() {
        let error = parse_error_body(400, r#"{"message": "Linha inválida", "detail": "x"}"#);
        match error {
            AppError::Request {
                status,
                message,
                data,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Linha inválida");
                assert!(data.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_body_falls_back_to_detail() {
        let error = parse_error_body(404, r#"{"detail": "Nenhuma jornada ativa."}"#);
        assert!(error.is_not_found());
        assert_eq!(error.user_message(), "Nenhuma jornada ativa.");
    }

    #[test]
    fn test_parse_error_body_non_json() {
        let error = parse_error_body(502, "<html>Bad Gateway</html>");
        match &error {
            AppError::Request { data, message, .. } => {
                assert!(data.is_none());
                assert_eq!(message, "Erro no servidor. Tente novamente mais tarde.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_new_accepts_unvalidated_config() {
        let config = ApiConfig {
            base_url: "localhost:8000".to_string(),
            ..ApiConfig::default()
        };
        assert!(ApiClient::new(config, Arc::new(MemorySecureStore::new())).is_ok());
    }

    #[test]
    fn test_url_building() {
        let client = ApiClient::new(ApiConfig::default(), Arc::new(MemorySecureStore::new()))
            .unwrap();
        assert_eq!(
            client.url("/employee/journeys/active/"),
            "http://localhost:8000/api/v1/employee/journeys/active/"
        );
    }

    #[test]
    fn test_url_building_trims_trailing_slash() {
        let config = ApiConfig {
            base_url: "https://pagbus.com/api/v1/".to_string(),
            ..ApiConfig::default()
        };
        let client = ApiClient::new(config, Arc::new(MemorySecureStore::new())).unwrap();

        assert_eq!(
            client.url("/employee/journeys/active/"),
            "https://pagbus.com/api/v1/employee/journeys/active/"
        );
        assert_eq!(
            client.config.token_refresh_url(),
            "https://pagbus.com/api/token/refresh/"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // ポート1は通常リッスンされていないため接続に失敗する
        let config = ApiConfig {
            base_url: "http://127.0.0.1:1/api/v1".to_string(),
            timeout_seconds: 2,
            max_retries: 0,
            ..ApiConfig::default()
        };
        let client = ApiClient::new(config, Arc::new(MemorySecureStore::new())).unwrap();

        let result: AppResult<Value> = client.get("/employee/journeys/active/").await;
        assert!(matches!(result, Err(AppError::Network(_))));
    }

    /// ローカルサーバーが受け取ったリクエスト
    #[derive(Debug)]
    struct RecordedRequest {
        line: String,
        authorization: Option<String>,
        body: String,
    }

    type Recorded = Arc<std::sync::Mutex<Vec<RecordedRequest>>>;

    /// 決められた順にレスポンスを返すHTTPサーバーを起動する
    ///
    /// # 戻り値
    /// APIのベースURLと受信したリクエストの記録
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Recorded) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded: Recorded = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = recorded.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/api/v1"), recorded)
    }

    async fn read_request(socket: &mut TcpStream) -> RecordedRequest {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let header = |name: &str| {
            head.lines().find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim().to_string())
            })
        };
        let length: usize = header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        RecordedRequest {
            line: head.lines().next().unwrap_or_default().to_string(),
            authorization: header("authorization"),
            body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
        }
    }

    fn client_with_session(base_url: String, refresh: Option<&str>) -> (ApiClient, Arc<MemorySecureStore>) {
        let store = Arc::new(MemorySecureStore::new());
        store.set(SecureStorageKeys::AUTH_TOKEN, "old").unwrap();
        store.set(SecureStorageKeys::USER_ID, "3").unwrap();
        store.set(SecureStorageKeys::COMPANY_ID, "1").unwrap();
        if let Some(refresh) = refresh {
            store.set(SecureStorageKeys::REFRESH_TOKEN, refresh).unwrap();
        }

        let config = ApiConfig {
            base_url,
            timeout_seconds: 5,
            max_retries: 0,
            ..ApiConfig::default()
        };
        (ApiClient::new(config, store.clone()).unwrap(), store)
    }

    fn assert_session_wiped(store: &MemorySecureStore) {
        assert_eq!(store.get(SecureStorageKeys::AUTH_TOKEN).unwrap(), None);
        assert_eq!(store.get(SecureStorageKeys::REFRESH_TOKEN).unwrap(), None);
        assert_eq!(store.get(SecureStorageKeys::USER_ID).unwrap(), None);
    }

    #[tokio::test]
    async fn test_refresh_retries_with_new_token() {
        let (base_url, recorded) = serve(vec![
            (401, r#"{"detail": "Token expirado"}"#),
            (200, r#"{"access": "new", "refresh": "r2"}"#),
            (200, r#"{"id": 55}"#),
        ])
        .await;
        let (client, store) = client_with_session(base_url, Some("r1"));

        let body: Value = client.get("/employee/journeys/active/").await.unwrap();
        assert_eq!(body["id"], 55);

        let requests = recorded.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].line, "GET /api/v1/employee/journeys/active/ HTTP/1.1");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer old"));
        assert_eq!(requests[1].line, "POST /api/token/refresh/ HTTP/1.1");
        assert_eq!(requests[1].authorization, None);
        assert!(requests[1].body.contains(r#""refresh":"r1""#));
        assert_eq!(requests[2].authorization.as_deref(), Some("Bearer new"));

        assert_eq!(store.get(SecureStorageKeys::AUTH_TOKEN).unwrap().as_deref(), Some("new"));
        assert_eq!(store.get(SecureStorageKeys::REFRESH_TOKEN).unwrap().as_deref(), Some("r2"));
        assert_eq!(store.get(SecureStorageKeys::USER_ID).unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_second_401_expires_session() {
        let (base_url, recorded) = serve(vec![
            (401, "{}"),
            (200, r#"{"access": "new"}"#),
            (401, "{}"),
        ])
        .await;
        let (client, store) = client_with_session(base_url, Some("r1"));

        let result: AppResult<Value> = client.get("/employee/journeys/active/").await;
        match result {
            Err(AppError::Auth(message)) => assert_eq!(message, SESSION_EXPIRED_MESSAGE),
            other => panic!("unexpected result: {other:?}"),
        }

        let requests = recorded.lock().unwrap();
        let authorizations: Vec<_> = requests.iter().map(|r| r.authorization.clone()).collect();
        assert_eq!(
            authorizations,
            vec![Some("Bearer old".to_string()), None, Some("Bearer new".to_string())]
        );
        assert_session_wiped(&store);
        // 会社IDはセッション切れでは消さない
        assert_eq!(store.get(SecureStorageKeys::COMPANY_ID).unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_401_without_refresh_token_expires_session() {
        let (base_url, recorded) = serve(vec![(401, "{}")]).await;
        let (client, store) = client_with_session(base_url, None);

        let result: AppResult<Value> = client.get("/employee/journeys/active/").await;
        assert!(matches!(result, Err(AppError::Auth(_))));

        assert_eq!(recorded.lock().unwrap().len(), 1);
        assert_session_wiped(&store);
    }

    #[tokio::test]
    async fn test_rejected_refresh_expires_session() {
        let (base_url, recorded) = serve(vec![
            (401, "{}"),
            (401, r#"{"detail": "Token inválido"}"#),
        ])
        .await;
        let (client, store) = client_with_session(base_url, Some("r1"));

        let result: AppResult<Value> = client.get("/employee/journeys/active/").await;
        assert!(matches!(result, Err(AppError::Auth(_))));

        let requests = recorded.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].line, "POST /api/token/refresh/ HTTP/1.1");
        assert_session_wiped(&store);
    }
}
