// 決済ステータスのポーリング
//
// QRコード表示中に取引ステータスを定期的に確認し、承認されたら一度だけ
// 成功画面へ遷移させる。停止はキャンセレーショントークンで行い、
// ハンドルを破棄した場合も必ずタイマーを止める。

use crate::features::payments::api::TransactionStatusSource;
use crate::features::payments::models::{
    verify_ownership, PaymentContext, PaymentSuccess, TransactionStatus,
};
use crate::shared::errors::AppError;
use crate::shared::utils::date::current_brasilia_date_time;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// デフォルトのポーリング間隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// 1回の確認結果
#[derive(Debug)]
pub enum CheckOutcome {
    /// まだ承認されていない
    Pending(TransactionStatus),
    /// 他のユーザーの取引のため無視した
    Ignored(AppError),
    /// 承認された（遷移は1回だけ）
    Approved(PaymentSuccess),
    /// すでに遷移済み
    AlreadyNavigated,
    /// 認可エラーのためポーリングを止める
    Unauthorized(AppError),
    /// 一時的なエラー（次回も確認を続ける）
    Failed(AppError),
}

/// ポーリングの終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    Approved,
    Unauthorized,
    Cancelled,
}

/// 1件の取引を監視するポーラー
pub struct PaymentPoller {
    source: Arc<dyn TransactionStatusSource>,
    context: PaymentContext,
    session_user_id: Option<i64>,
    navigated: AtomicBool,
}

impl PaymentPoller {
    /// 新しいPaymentPollerを作成する
    ///
    /// # 引数
    /// * `source` - 取引ステータスの取得元
    /// * `context` - 成功画面へ引き継ぐ情報（取引IDを含む）
    /// * `session_user_id` - ログイン中のユーザーID
    pub fn new(
        source: Arc<dyn TransactionStatusSource>,
        context: PaymentContext,
        session_user_id: Option<i64>,
    ) -> Self {
        Self {
            source,
            context,
            session_user_id,
            navigated: AtomicBool::new(false),
        }
    }

    /// 監視中の取引ID
    pub fn transaction_id(&self) -> &str {
        &self.context.transaction_id
    }

    /// すでに成功画面へ遷移したかどうか
    pub fn has_navigated(&self) -> bool {
        self.navigated.load(Ordering::SeqCst)
    }

    /// 取引ステータスを1回確認する
    pub async fn check(&self) -> CheckOutcome {
        if self.has_navigated() {
            return CheckOutcome::AlreadyNavigated;
        }

        let status = match self.source.transaction_status(self.transaction_id()).await {
            Ok(status) => status,
            Err(e) if e.is_authorization() => {
                warn!(
                    "取引ステータスの確認が拒否されました。ポーリングを停止します: transaction_id={}, error={e}",
                    self.transaction_id()
                );
                return CheckOutcome::Unauthorized(e);
            }
            Err(e) => {
                debug!(
                    "取引ステータスの確認に失敗しました（継続）: transaction_id={}, error={e}",
                    self.transaction_id()
                );
                return CheckOutcome::Failed(e);
            }
        };

        if let Err(mismatch) = verify_ownership(status.owner_user_id(), self.session_user_id) {
            warn!(
                "他のユーザーの取引のため無視します: transaction_id={}, {mismatch}",
                self.transaction_id()
            );
            return CheckOutcome::Ignored(mismatch);
        }

        if !status.payment_status.is_approved() {
            debug!(
                "決済は未承認です: transaction_id={}, status={}",
                self.transaction_id(),
                status.payment_status.as_str()
            );
            return CheckOutcome::Pending(status);
        }

        if self
            .navigated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return CheckOutcome::AlreadyNavigated;
        }

        info!(
            "決済が承認されました: transaction_id={}, tariff_value={}",
            self.transaction_id(),
            self.context.tariff_value
        );

        CheckOutcome::Approved(PaymentSuccess {
            context: self.context.clone(),
            transaction: status,
            confirmed_at: current_brasilia_date_time(),
        })
    }

    /// ポーリングを開始する
    ///
    /// 開始直後に1回確認し、その後は `interval` ごとに確認する。
    /// 前回の確認が終わるまで次の確認は行わない。
    pub fn start(self: Arc<Self>, interval: Duration) -> PollerHandle {
        let token = CancellationToken::new();
        let (success_tx, success_rx) = oneshot::channel();

        info!(
            "決済ステータスのポーリングを開始します: transaction_id={}, interval={interval:?}",
            self.transaction_id()
        );

        let task = tokio::spawn(run(self, interval, token.clone(), success_tx));

        PollerHandle {
            token,
            task: Some(task),
            success: Some(success_rx),
        }
    }
}

async fn run(
    poller: Arc<PaymentPoller>,
    interval: Duration,
    token: CancellationToken,
    success_tx: oneshot::Sender<PaymentSuccess>,
) -> PollerExit {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // 停止された場合は確認中のレスポンスを捨てる
        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = poller.check() => outcome,
        };

        match outcome {
            CheckOutcome::Approved(success) => {
                if success_tx.send(success).is_err() {
                    debug!("成功通知の受信側がすでに破棄されています");
                }
                return PollerExit::Approved;
            }
            CheckOutcome::AlreadyNavigated => return PollerExit::Approved,
            CheckOutcome::Unauthorized(_) => return PollerExit::Unauthorized,
            CheckOutcome::Pending(_) | CheckOutcome::Ignored(_) | CheckOutcome::Failed(_) => {}
        }
    }

    debug!(
        "決済ステータスのポーリングを停止しました: transaction_id={}",
        poller.transaction_id()
    );
    PollerExit::Cancelled
}

/// ポーリングタスクのハンドル
///
/// 画面を閉じるときに `stop()` するか、ハンドルを破棄すればタイマーは止まる
pub struct PollerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<PollerExit>>,
    success: Option<oneshot::Receiver<PaymentSuccess>>,
}

impl PollerHandle {
    /// ポーリングを停止する
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// 停止済みかどうか
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
            || self
                .task
                .as_ref()
                .map_or(true, |task| task.is_finished())
    }

    /// 承認を待つ
    ///
    /// # 戻り値
    /// 承認された場合は成功画面の情報。停止・認可エラーで終わった場合はNone。
    /// 2回目以降の呼び出しは常にNone。
    pub async fn wait_for_approval(&mut self) -> Option<PaymentSuccess> {
        let receiver = self.success.take()?;
        receiver.await.ok()
    }

    /// タスクの終了を待ち、終了理由を返す
    pub async fn join(mut self) -> PollerExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!("ポーリングタスクが異常終了しました: {e}");
                PollerExit::Cancelled
            }),
            None => PollerExit::Cancelled,
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
