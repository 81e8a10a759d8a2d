use thiserror::Error;

/// 接続エラー時にユーザーへ表示するメッセージ
pub const CONNECTION_ERROR_MESSAGE: &str = "Erro de conexão. Verifique sua internet.";

/// サーバーがメッセージを返さなかった場合のフォールバック
pub const GENERIC_REQUEST_ERROR_MESSAGE: &str = "Erro ao processar requisição";

/// セッション切れ時のメッセージ
pub const SESSION_EXPIRED_MESSAGE: &str = "Sessão expirada. Faça login novamente.";

/// アプリケーション全体で使用される統一エラー型
#[derive(Debug, Error)]
pub enum AppError {
    /// サーバーに到達できなかった（接続失敗・タイムアウト）
    #[error("ネットワークエラー: {0}")]
    Network(String),

    /// サーバーがエラーステータスで応答した
    #[error("リクエストエラー: status={status}, message={message}")]
    Request {
        status: u16,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// リフレッシュ失敗後の401
    #[error("認証エラー: {0}")]
    Auth(String),

    /// 取引の所有者がログイン中のユーザーと一致しない
    #[error(
        "取引の所有者が一致しません: transaction_user_id={transaction_user_id}, session_user_id={session_user_id:?}"
    )]
    OwnershipMismatch {
        transaction_user_id: i64,
        session_user_id: Option<i64>,
    },

    /// セキュアストレージ関連のエラー
    #[error("ストレージエラー: {0}")]
    Storage(String),

    /// バリデーション関連のエラー
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// リソースが見つからない場合のエラー
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 設定関連のエラー
    #[error("設定エラー: {0}")]
    Configuration(String),

    /// I/O関連のエラー
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    /// JSON解析エラー
    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),
}

/// エラーの重要度を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    /// 低重要度（ユーザー入力エラーなど）
    Low,
    /// 中重要度（通信の一時的なエラーなど）
    Medium,
    /// 高重要度（設定エラーなど）
    High,
    /// 最重要（認証切れなど）
    Critical,
}

impl ErrorSeverity {
    /// ログ出力時のレベル
    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Low => log::Level::Debug,
            ErrorSeverity::Medium => log::Level::Warn,
            ErrorSeverity::High | ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

impl AppError {
    /// ユーザーに表示するためのメッセージを取得
    ///
    /// サーバーエラーは `message` → `data.detail` → 汎用メッセージの順で選ぶ
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => CONNECTION_ERROR_MESSAGE.to_string(),
            AppError::Request { message, data, .. } => {
                if !message.trim().is_empty() {
                    return message.clone();
                }
                data.as_ref()
                    .and_then(|d| d.get("detail"))
                    .and_then(|d| d.as_str())
                    .filter(|d| !d.trim().is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| GENERIC_REQUEST_ERROR_MESSAGE.to_string())
            }
            AppError::Auth(msg) => msg.clone(),
            AppError::OwnershipMismatch { .. } => {
                "Este pagamento pertence a outro usuário.".to_string()
            }
            AppError::Storage(_) => "Erro ao acessar o armazenamento do dispositivo.".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Configuration(_) => "Erro de configuração do aplicativo.".to_string(),
            AppError::Io(_) => "Erro ao acessar arquivos do dispositivo.".to_string(),
            AppError::Json(_) => "Resposta inválida do servidor.".to_string(),
        }
    }

    /// エラーの詳細情報を取得（ログ出力用）
    pub fn details(&self) -> String {
        format!("{self}")
    }

    /// エラーの重要度を取得
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AppError::Network(_) => ErrorSeverity::Medium,
            AppError::Request { status, .. } if *status >= 500 => ErrorSeverity::High,
            AppError::Request { .. } => ErrorSeverity::Low,
            AppError::Auth(_) => ErrorSeverity::Critical,
            AppError::OwnershipMismatch { .. } => ErrorSeverity::Low,
            AppError::Storage(_) => ErrorSeverity::Medium,
            AppError::Validation(_) => ErrorSeverity::Low,
            AppError::NotFound(_) => ErrorSeverity::Low,
            AppError::Configuration(_) => ErrorSeverity::High,
            AppError::Io(_) => ErrorSeverity::Medium,
            AppError::Json(_) => ErrorSeverity::Medium,
        }
    }

    /// サーバーが404を返したかどうか
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Request { status: 404, .. } | AppError::NotFound(_))
    }

    /// 認可系のエラー（401/403、またはセッション切れ）かどうか
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            AppError::Auth(_) | AppError::Request { status: 401 | 403, .. }
        )
    }

    /// サーバーに到達できなかったエラーかどうか
    pub fn is_network(&self) -> bool {
        matches!(self, AppError::Network(_))
    }

    /// HTTPステータス（サーバーが応答した場合のみ）
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Request { status, .. } => Some(*status),
            AppError::Auth(_) => Some(401),
            _ => None,
        }
    }

    /// サーバーエラーを作成するヘルパー関数
    pub fn request<S: Into<String>>(
        status: u16,
        message: S,
        data: Option<serde_json::Value>,
    ) -> Self {
        AppError::Request {
            status,
            message: message.into(),
            data,
        }
    }

    /// ネットワークエラーを作成するヘルパー関数
    pub fn network<S: Into<String>>(message: S) -> Self {
        AppError::Network(message.into())
    }

    /// バリデーションエラーを作成するヘルパー関数
    pub fn validation<S: Into<String>>(message: S) -> Self {
        AppError::Validation(message.into())
    }

    /// リソース未発見エラーを作成するヘルパー関数
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound(format!("{} não encontrado(a)", resource.into()))
    }

    /// ストレージエラーを作成するヘルパー関数
    pub fn storage<S: Into<String>>(message: S) -> Self {
        AppError::Storage(message.into())
    }

    /// 設定エラーを作成するヘルパー関数
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }
}

/// AppErrorからStringへの変換（コマンドでアラート表示に使用）
///
/// 変換時に重要度に応じたレベルで詳細をログに残す
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        log::log!(error.severity().log_level(), "コマンドエラー: {}", error.details());
        error.user_message()
    }
}

/// Result型のエイリアス（アプリケーション全体で使用）
pub type AppResult<T> = Result<T, AppError>;
