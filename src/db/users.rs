use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{OnUnique, RepoError, RepoResult};
use crate::logging::{Field, Logger};
use crate::models::{NewUser, User};

use super::{exec, expect_affected, Op};

const ENTITY: &str = "user";

const SQL_CREATE_USER: &str = r#"
    INSERT INTO users (name, email, password, created_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id, name, email, password AS password_hash, created_at, updated_at, last_login_at
"#;

const SQL_GET_USER_BY_ID: &str = r#"
    SELECT id, name, email, password AS password_hash, created_at, updated_at, last_login_at
    FROM users
    WHERE id = $1
"#;

const SQL_GET_USER_BY_EMAIL: &str = r#"
    SELECT id, name, email, password AS password_hash, created_at, updated_at, last_login_at
    FROM users
    WHERE email = $1
"#;

const SQL_UPDATE_USER: &str = r#"
    UPDATE users
    SET name = $2,
        email = $3,
        password = $4,
        updated_at = $5
    WHERE id = $1
    RETURNING id, name, email, password AS password_hash, created_at, updated_at, last_login_at
"#;

const SQL_UPDATE_USER_LAST_LOGIN_AT: &str = r#"
    UPDATE users
    SET updated_at = $2,
        last_login_at = $3
    WHERE id = $1
"#;

const SQL_DELETE_USER: &str = "DELETE FROM users WHERE id = $1";

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 중복 email이면 `AlreadyExists`
    async fn create(&self, ctx: &Context, user: NewUser) -> RepoResult<User>;

    async fn get_by_id(&self, ctx: &Context, id: i64) -> RepoResult<User>;

    async fn get_by_email(&self, ctx: &Context, email: &str) -> RepoResult<User>;

    /// name/email/password를 바꾸고 updated_at을 찍습니다.
    async fn update(&self, ctx: &Context, user: &User) -> RepoResult<User>;

    /// 인증 성공 시 호출. updated_at과 last_login_at만 바꿉니다.
    async fn update_last_login_at(
        &self,
        ctx: &Context,
        id: i64,
        last_login_at: DateTime<Utc>,
    ) -> RepoResult<()>;

    async fn delete(&self, ctx: &Context, id: i64) -> RepoResult<()>;
}

pub struct PgUserRepository {
    pool: PgPool,
    logger: Arc<dyn Logger>,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, logger: Arc<dyn Logger>) -> Self {
        Self { pool, logger }
    }

    fn op(&self, operation: &'static str, ids: Vec<Field>, params: Vec<Field>) -> Op<'_> {
        Op::start(self.logger.as_ref(), ENTITY, operation, ids, params)
    }
}

// password_hash는 어떤 로그에도 싣지 않습니다.
fn user_ids(user: &User) -> Vec<Field> {
    vec![Field::new("id", user.id), Field::new("email", &user.email)]
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, ctx: &Context, user: NewUser) -> RepoResult<User> {
        let created_at = Utc::now();
        let op = self.op(
            "insert",
            vec![Field::new("email", &user.email)],
            vec![
                Field::new("name", &user.name),
                Field::new("created_at", created_at),
            ],
        );

        let result = exec(
            ctx,
            OnUnique::AlreadyExists,
            sqlx::query_as::<_, User>(SQL_CREATE_USER)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(created_at)
                .fetch_one(&self.pool),
        )
        .await;

        op.finish(result, user_ids)
    }

    async fn get_by_id(&self, ctx: &Context, id: i64) -> RepoResult<User> {
        let op = self.op("get_by_id", vec![Field::new("id", id)], vec![]);

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query_as::<_, User>(SQL_GET_USER_BY_ID)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
        .and_then(|row| row.ok_or_else(RepoError::no_rows));

        op.finish(result, user_ids)
    }

    async fn get_by_email(&self, ctx: &Context, email: &str) -> RepoResult<User> {
        let op = self.op("get_by_email", vec![Field::new("email", email)], vec![]);

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query_as::<_, User>(SQL_GET_USER_BY_EMAIL)
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await
        .and_then(|row| row.ok_or_else(RepoError::no_rows));

        op.finish(result, user_ids)
    }

    async fn update(&self, ctx: &Context, user: &User) -> RepoResult<User> {
        let updated_at = Utc::now();
        let op = self.op(
            "update",
            vec![Field::new("id", user.id)],
            vec![
                Field::new("name", &user.name),
                Field::new("email", &user.email),
                Field::new("updated_at", updated_at),
                Field::new("last_login_at", user.last_login_at),
            ],
        );

        let result = exec(
            ctx,
            OnUnique::AlreadyExists,
            sqlx::query_as::<_, User>(SQL_UPDATE_USER)
                .bind(user.id)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(updated_at)
                .fetch_optional(&self.pool),
        )
        .await
        .and_then(|row| row.ok_or_else(RepoError::no_rows));

        op.finish(result, user_ids)
    }

    async fn update_last_login_at(
        &self,
        ctx: &Context,
        id: i64,
        last_login_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let updated_at = Utc::now();
        let op = self.op(
            "update_last_login_at",
            vec![Field::new("id", id)],
            vec![
                Field::new("updated_at", updated_at),
                Field::new("last_login_at", last_login_at),
            ],
        );

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query(SQL_UPDATE_USER_LAST_LOGIN_AT)
                .bind(id)
                .bind(updated_at)
                .bind(last_login_at)
                .execute(&self.pool),
        )
        .await
        .and_then(|done| expect_affected(done.rows_affected()));

        op.finish(result, |_| vec![Field::new("id", id)])
    }

    async fn delete(&self, ctx: &Context, id: i64) -> RepoResult<()> {
        let op = self.op("delete", vec![Field::new("id", id)], vec![]);

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query(SQL_DELETE_USER).bind(id).execute(&self.pool),
        )
        .await
        .and_then(|done| expect_affected(done.rows_affected()));

        op.finish(result, |_| vec![Field::new("id", id)])
    }
}
