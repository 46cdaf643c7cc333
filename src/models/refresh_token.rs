//! # Refresh 토큰 모델
//!
//! 토큰 원문은 저장하지 않습니다. 호출자(인증 서비스)가 `hash_token()`으로
//! 만든 SHA-256 hex 문자열만 `token_hash`에 저장하고, 조회도 해시로 합니다.
//!
//! ## 회전(rotation) 체인
//! ```text
//! [A] --replaced_by_token--> [B] --replaced_by_token--> [C] (활성)
//! ```
//! `revoked_at`이 채워진 토큰은 인증에 절대 사용하면 안 됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// None이면 활성 상태
    pub revoked_at: Option<DateTime<Utc>>,
    /// 이 토큰을 대체한 토큰의 id. 참조 무결성은 인증 서비스가 책임집니다.
    pub replaced_by_token: Option<i64>,
}

impl RefreshToken {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// 인증에 사용할 수 있는지: 폐기되지 않았고 만료되지 않았어야 합니다.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewRefreshToken {
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl NewRefreshToken {
    pub fn new(user_id: i64, token_hash: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            token_hash: token_hash.into(),
            expires_at,
        }
    }
}

/// 토큰 원문을 저장용 해시(소문자 hex SHA-256)로 변환합니다.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
