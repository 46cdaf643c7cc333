//! # Refresh 토큰 저장소
//!
//! 토큰은 행 단위로 삭제하지 않습니다. 폐기(`revoke_by_id`)로 무효화하고,
//! 만료/폐기된 토큰은 정리 작업(`cleanup_expired`, `cleanup_revoked`)이 한꺼번에 지웁니다.
//!
//! 정리 작업은 지운 id 목록을 반환합니다. 지울 것이 없으면 빈 목록이고 에러가 아닙니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{OnUnique, RepoError, RepoResult};
use crate::logging::{Field, Logger};
use crate::models::{NewRefreshToken, RefreshToken};

use super::{exec, expect_affected, Op};

const ENTITY: &str = "refresh_token";

const SQL_CREATE_REFRESH_TOKEN: &str = r#"
    INSERT INTO refresh_tokens (user_id, token, expires_at, created_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id, user_id, token AS token_hash, expires_at, created_at, revoked_at, replaced_by_token
"#;

const SQL_GET_REFRESH_TOKEN_BY_ID: &str = r#"
    SELECT id, user_id, token AS token_hash, expires_at, created_at, revoked_at, replaced_by_token
    FROM refresh_tokens
    WHERE id = $1
"#;

const SQL_GET_REFRESH_TOKEN_BY_HASH: &str = r#"
    SELECT id, user_id, token AS token_hash, expires_at, created_at, revoked_at, replaced_by_token
    FROM refresh_tokens
    WHERE token = $1
"#;

const SQL_REVOKE_REFRESH_TOKEN: &str = r#"
    UPDATE refresh_tokens
    SET revoked_at = $2
    WHERE id = $1
"#;

const SQL_SET_REPLACED_BY_TOKEN: &str = r#"
    UPDATE refresh_tokens
    SET replaced_by_token = $2
    WHERE id = $1
"#;

const SQL_DELETE_EXPIRED_REFRESH_TOKENS: &str = r#"
    DELETE FROM refresh_tokens
    WHERE expires_at < NOW()
    RETURNING id
"#;

const SQL_DELETE_REVOKED_REFRESH_TOKENS: &str = r#"
    DELETE FROM refresh_tokens
    WHERE revoked_at IS NOT NULL
    RETURNING id
"#;

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// token_hash가 이미 있으면 `AlreadyExists`
    async fn create(&self, ctx: &Context, token: NewRefreshToken) -> RepoResult<RefreshToken>;

    async fn get_by_id(&self, ctx: &Context, id: i64) -> RepoResult<RefreshToken>;

    async fn get_by_token(&self, ctx: &Context, token_hash: &str) -> RepoResult<RefreshToken>;

    /// revoked_at을 설정합니다. 이미 폐기된 토큰에 다시 호출하면 revoked_at을 덮어씁니다.
    async fn revoke_by_id(
        &self,
        ctx: &Context,
        id: i64,
        revoked_at: DateTime<Utc>,
    ) -> RepoResult<()>;

    /// 회전 체인 연결: `id` 토큰이 `replaced_by` 토큰으로 대체되었음을 기록합니다.
    async fn set_replaced_by(&self, ctx: &Context, id: i64, replaced_by: i64) -> RepoResult<()>;

    /// expires_at이 현재(DB 시각)보다 이전인 토큰을 모두 지우고 지운 id를 반환합니다.
    async fn cleanup_expired(&self, ctx: &Context) -> RepoResult<Vec<i64>>;

    /// 폐기된 토큰을 모두 지우고 지운 id를 반환합니다.
    async fn cleanup_revoked(&self, ctx: &Context) -> RepoResult<Vec<i64>>;
}

pub struct PgRefreshTokenRepository {
    pool: PgPool,
    logger: Arc<dyn Logger>,
}

impl PgRefreshTokenRepository {
    pub fn new(pool: PgPool, logger: Arc<dyn Logger>) -> Self {
        Self { pool, logger }
    }

    fn op(&self, operation: &'static str, ids: Vec<Field>, params: Vec<Field>) -> Op<'_> {
        Op::start(self.logger.as_ref(), ENTITY, operation, ids, params)
    }

    async fn sweep(
        &self,
        ctx: &Context,
        operation: &'static str,
        sql: &'static str,
    ) -> RepoResult<Vec<i64>> {
        let op = self.op(operation, vec![], vec![]);

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query_scalar::<_, i64>(sql).fetch_all(&self.pool),
        )
        .await;

        op.finish(result, |ids| vec![Field::new("removed", ids.len())])
    }
}

// token_hash는 로그에 남기지 않습니다.
fn token_ids(token: &RefreshToken) -> Vec<Field> {
    vec![
        Field::new("id", token.id),
        Field::new("user_id", token.user_id),
    ]
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn create(&self, ctx: &Context, token: NewRefreshToken) -> RepoResult<RefreshToken> {
        let created_at = Utc::now();
        let op = self.op(
            "insert",
            vec![Field::new("user_id", token.user_id)],
            vec![
                Field::new("expires_at", token.expires_at),
                Field::new("created_at", created_at),
            ],
        );

        let result = exec(
            ctx,
            OnUnique::AlreadyExists,
            sqlx::query_as::<_, RefreshToken>(SQL_CREATE_REFRESH_TOKEN)
                .bind(token.user_id)
                .bind(&token.token_hash)
                .bind(token.expires_at)
                .bind(created_at)
                .fetch_one(&self.pool),
        )
        .await;

        op.finish(result, token_ids)
    }

    async fn get_by_id(&self, ctx: &Context, id: i64) -> RepoResult<RefreshToken> {
        let op = self.op("get_by_id", vec![Field::new("id", id)], vec![]);

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query_as::<_, RefreshToken>(SQL_GET_REFRESH_TOKEN_BY_ID)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
        .and_then(|row| row.ok_or_else(RepoError::no_rows));

        op.finish(result, token_ids)
    }

    async fn get_by_token(&self, ctx: &Context, token_hash: &str) -> RepoResult<RefreshToken> {
        let op = self.op("get_by_token", vec![], vec![]);

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query_as::<_, RefreshToken>(SQL_GET_REFRESH_TOKEN_BY_HASH)
                .bind(token_hash)
                .fetch_optional(&self.pool),
        )
        .await
        .and_then(|row| row.ok_or_else(RepoError::no_rows));

        op.finish(result, token_ids)
    }

    async fn revoke_by_id(
        &self,
        ctx: &Context,
        id: i64,
        revoked_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let op = self.op(
            "revoke",
            vec![Field::new("id", id)],
            vec![Field::new("revoked_at", revoked_at)],
        );

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query(SQL_REVOKE_REFRESH_TOKEN)
                .bind(id)
                .bind(revoked_at)
                .execute(&self.pool),
        )
        .await
        .and_then(|done| expect_affected(done.rows_affected()));

        op.finish(result, |_| vec![Field::new("id", id)])
    }

    async fn set_replaced_by(&self, ctx: &Context, id: i64, replaced_by: i64) -> RepoResult<()> {
        let op = self.op(
            "set_replaced_by",
            vec![Field::new("id", id)],
            vec![Field::new("replaced_by_token", replaced_by)],
        );

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query(SQL_SET_REPLACED_BY_TOKEN)
                .bind(id)
                .bind(replaced_by)
                .execute(&self.pool),
        )
        .await
        .and_then(|done| expect_affected(done.rows_affected()));

        op.finish(result, |_| {
            vec![
                Field::new("id", id),
                Field::new("replaced_by_token", replaced_by),
            ]
        })
    }

    async fn cleanup_expired(&self, ctx: &Context) -> RepoResult<Vec<i64>> {
        self.sweep(ctx, "cleanup_expired", SQL_DELETE_EXPIRED_REFRESH_TOKENS)
            .await
    }

    async fn cleanup_revoked(&self, ctx: &Context) -> RepoResult<Vec<i64>> {
        self.sweep(ctx, "cleanup_revoked", SQL_DELETE_REVOKED_REFRESH_TOKENS)
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tracing::Level;

    use super::*;
    use crate::db::testing;
    use crate::error::ErrorKind;
    use crate::logging::{RecordingLogger, Value};
    use crate::models::hash_token;

    fn repo() -> (PgRefreshTokenRepository, Arc<RecordingLogger>) {
        let logger = Arc::new(RecordingLogger::new());
        (
            PgRefreshTokenRepository::new(testing::lazy_pool(), logger.clone()),
            logger,
        )
    }

    #[tokio::test]
    async fn token_hash_is_never_logged() {
        let (repo, logger) = repo();
        let hash = hash_token("raw-refresh-token");
        let ctx = testing::expired();

        let _ = repo
            .create(&ctx, NewRefreshToken::new(3, hash.clone(), Utc::now() + Duration::days(7)))
            .await;
        let _ = repo.get_by_token(&ctx, &hash).await;

        assert_eq!(logger.at_level(Level::ERROR).len(), 2);
        for record in logger.records() {
            assert!(!record.fields.iter().any(|f| f.value.to_string().contains(&hash)));
        }
    }

    #[tokio::test]
    async fn sweeps_honour_cancellation() {
        let (repo, logger) = repo();
        let ctx = testing::cancelled();

        assert_eq!(
            repo.cleanup_expired(&ctx).await.unwrap_err().kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            repo.cleanup_revoked(&ctx).await.unwrap_err().kind(),
            ErrorKind::Timeout
        );

        let entries = logger.at_level(Level::DEBUG);
        assert_eq!(
            entries[0].message,
            "monitor[refresh_token]: starting refresh_token db cleanup_expired"
        );
        assert_eq!(
            logger.at_level(Level::ERROR)[1].field("operation"),
            Some(&Value::from("cleanup_revoked"))
        );
    }

    #[tokio::test]
    async fn revoke_and_rotation_honour_deadline() {
        let (repo, _) = repo();
        let ctx = testing::expired();
        assert_eq!(
            repo.revoke_by_id(&ctx, 1, Utc::now()).await.unwrap_err().kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            repo.set_replaced_by(&ctx, 1, 2).await.unwrap_err().kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            repo.get_by_id(&ctx, 1).await.unwrap_err().kind(),
            ErrorKind::Timeout
        );
    }
}
