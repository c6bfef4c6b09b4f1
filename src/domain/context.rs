use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// リクエスト単位のコンテキスト
///
/// 境界アダプターで作成し、サービス・リポジトリ・ゲートウェイの全呼び出しに
/// 明示的な引数として渡す。相関IDはログのspanフィールドに、期限は下流の
/// リモート呼び出しのタイムアウトに使われる。
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: String,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// 相関IDを指定して作成（空文字列の場合は新規生成）
    pub fn new(correlation_id: impl Into<String>) -> Self {
        let correlation_id = correlation_id.into();
        let correlation_id = if correlation_id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            correlation_id
        };
        Self {
            correlation_id,
            deadline: None,
        }
    }

    /// 新しい相関IDでコンテキストを作成
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// 現在時刻から `timeout` 後を期限に設定
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 期限までの残り時間
    /// 期限なしの場合は `None`、期限切れの場合は `Some(Duration::ZERO)`
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(remaining) if remaining.is_zero())
    }
}
