//! # 에러 분류 모듈
//!
//! 저장소 계층의 모든 실패는 네 가지 중 하나로 분류됩니다:
//!
//! | 종류            | 의미                                         | 전송 계층 매핑(참고) |
//! |-----------------|----------------------------------------------|----------------------|
//! | `NotFound`      | 정확히 한 행을 기대했는데 0행                 | 404                  |
//! | `AlreadyExists` | 유니크 제약 위반 (예: 중복 email)             | 409                  |
//! | `Timeout`       | 호출자 컨텍스트의 deadline 만료/취소          | 504 (재시도 가능)    |
//! | `Database`      | 그 외 모든 실패 (연결 끊김, 잘못된 쿼리 등)   | 500                  |
//!
//! 각 variant는 원래의 에러를 `source`로 감싸서 보관합니다.
//! 호출자는 `kind()`로 종류를, `std::error::Error::source()`로 원인을 확인합니다.
//! 드라이버 타입(sqlx::Error)은 공개 시그니처에 드러나지 않습니다.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::context::Context;

/// 원인 에러를 담는 박스 타입
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type RepoResult<T> = Result<T, RepoError>;

/// 에러 종류. 매칭과 로그 필드에 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Timeout,
    Database,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Database => "database_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 저장소 연산의 분류된 에러
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("not found: {0}")]
    NotFound(#[source] BoxError),

    #[error("already exists: {0}")]
    AlreadyExists(#[source] BoxError),

    #[error("database query timeout: {0}")]
    Timeout(#[source] BoxError),

    #[error("database error: {0}")]
    Database(#[source] BoxError),
}

impl RepoError {
    pub fn new(kind: ErrorKind, cause: impl Into<BoxError>) -> Self {
        let cause = cause.into();
        match kind {
            ErrorKind::NotFound => Self::NotFound(cause),
            ErrorKind::AlreadyExists => Self::AlreadyExists(cause),
            ErrorKind::Timeout => Self::Timeout(cause),
            ErrorKind::Database => Self::Database(cause),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Database(_) => ErrorKind::Database,
        }
    }

    /// 감싸고 있는 원인 에러
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        match self {
            Self::NotFound(e) | Self::AlreadyExists(e) | Self::Timeout(e) | Self::Database(e) => {
                e.as_ref()
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// 저장소는 재시도하지 않습니다. 재시도 여부는 호출자가 결정하며,
    /// 의미 있는 재시도 대상은 `Timeout`뿐입니다.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// UPDATE/DELETE가 0행에 영향을 준 경우
    pub(crate) fn no_rows() -> Self {
        Self::NotFound(Box::new(sqlx::Error::RowNotFound))
    }
}

/// 유니크 제약 위반을 어떻게 취급할지
///
/// 노트처럼 유니크 제약이 없는 테이블에서 23505가 나오면 예상 밖의 상황이므로
/// `Database`로 떨어뜨립니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnUnique {
    AlreadyExists,
    Database,
}

/// sqlx 에러를 분류합니다. 순서가 중요합니다:
/// 1. 컨텍스트가 끝났으면 드라이버가 무엇을 보고했든 `Timeout`
/// 2. `RowNotFound` -> `NotFound`
/// 3. SQLSTATE 23505 -> `on_unique`에 따라
/// 4. 나머지 -> `Database`
pub(crate) fn classify(ctx: &Context, err: sqlx::Error, on_unique: OnUnique) -> RepoError {
    if ctx.is_done() {
        return RepoError::Timeout(Box::new(err));
    }

    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound(Box::new(err)),
        sqlx::Error::Database(ref db_err)
            if on_unique == OnUnique::AlreadyExists && is_unique_violation(db_err.as_ref()) =>
        {
            RepoError::AlreadyExists(Box::new(err))
        }
        other => RepoError::Database(Box::new(other)),
    }
}

fn is_unique_violation(db_err: &dyn sqlx::error::DatabaseError) -> bool {
    // PostgreSQL unique_violation
    db_err.code().as_deref() == Some("23505")
}
