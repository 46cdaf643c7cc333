//! # 호출 컨텍스트 (deadline + 취소 신호)
//!
//! 모든 저장소 메서드는 호출자가 넘겨준 `Context`를 받습니다.
//! 컨텍스트는 두 가지 정보를 담습니다:
//! - **deadline**: 이 시각이 지나면 진행 중인 쿼리를 중단합니다.
//! - **취소 토큰**: 호출자가 `cancel()`을 부르면 즉시 중단합니다.
//!
//! 쿼리 future를 drop하면 sqlx가 진행 중인 요청을 버리고
//! 연결을 풀에 돌려주거나(정상 상태) 닫습니다(중간 상태).
//! 따라서 "중단"은 곧 future를 더 이상 poll하지 않는 것입니다.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 컨텍스트가 끝난 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    #[error("context canceled")]
    Cancelled,
}

/// 호출 단위의 deadline/취소 전파 객체
///
/// `Clone`은 같은 취소 토큰을 공유합니다. 한쪽에서 `cancel()`하면
/// 복제본 모두가 취소됩니다.
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// deadline이 없는 최상위 컨텍스트
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// 지금부터 `timeout` 뒤에 만료되는 컨텍스트
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    /// 부모의 취소를 이어받는 자식 컨텍스트를 만듭니다.
    ///
    /// deadline은 부모의 deadline과 `now + timeout` 중 더 이른 쪽입니다.
    /// 자식을 취소해도 부모는 취소되지 않습니다.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// 컨텍스트가 끝났다면 그 이유를 반환합니다. 만료가 취소보다 우선합니다.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_expired() {
            Some(ContextError::DeadlineExceeded)
        } else if self.is_cancelled() {
            Some(ContextError::Cancelled)
        } else {
            None
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// `fut`를 컨텍스트 안에서 실행합니다.
    ///
    /// - 이미 끝난 컨텍스트면 `fut`를 한 번도 poll하지 않고 바로 에러를 반환합니다.
    /// - deadline 도달 또는 취소 시 `fut`를 drop하고 에러를 반환합니다.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ContextError>
    where
        F: Future<Output = T>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ContextError::Cancelled),
            _ = deadline => Err(ContextError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
