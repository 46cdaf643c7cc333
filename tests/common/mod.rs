//! 통합 테스트 공용 헬퍼
//!
//! 통합 테스트는 `DATABASE_URL`이 가리키는 PostgreSQL 서버가 필요합니다.
//! `#[sqlx::test]`가 테스트마다 새 데이터베이스를 만들고 `fixtures/schema.sql`을 적용합니다.
//!
//! 실행: `DATABASE_URL=postgres://... cargo test -- --ignored`

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use personal_notes::{Context, Database, NewUser, RecordingLogger, Repository, User};
use sqlx::PgPool;

pub fn repository(pool: PgPool) -> (Repository, Arc<RecordingLogger>) {
    let logger = Arc::new(RecordingLogger::new());
    let db = Database::from_pool(pool);
    (Repository::new(&db, logger.clone()), logger)
}

pub fn ctx() -> Context {
    Context::with_timeout(Duration::from_secs(5))
}

pub async fn seed_user(repo: &Repository, email: &str) -> User {
    repo.users
        .create(&ctx(), NewUser::new("seed", email, "hash"))
        .await
        .expect("seed user")
}

pub async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count")
}
