//! # 데이터베이스 접근 계층 (Repository Layer)
//!
//! 엔티티별 저장소와 공용 연결 풀을 모아둔 모듈입니다.
//!
//! 각 하위 모듈:
//! - `pool`: 연결 풀 생성/확인/종료 (`Database`)
//! - `notes`: 노트 CRUD. 항상 (id, owner_id) 쌍으로 범위를 제한합니다.
//! - `users`: 사용자 CRUD + email 조회 + 마지막 로그인 시각 갱신
//! - `refresh_tokens`: 토큰 생성/조회/폐기/회전 + 만료·폐기 토큰 일괄 정리
//!
//! 모든 저장소 메서드는 같은 흐름을 따릅니다:
//! 1. `Op::start`로 debug 로그 (연산 파라미터, 민감 정보 제외)
//! 2. `exec`로 쿼리 하나를 컨텍스트 안에서 실행하고 에러를 분류
//! 3. `Op::finish`로 성공(info) 또는 실패(error) 로그
//!
//! 저장소끼리는 서로 호출하지 않습니다. 연결은 호출마다 풀에서 빌려 쓰고 바로 돌려줍니다.

pub mod notes;
pub mod pool;
pub mod refresh_tokens;
pub mod users;

pub use notes::*;
pub use pool::*;
pub use refresh_tokens::*;
pub use users::*;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::context::Context;
use crate::error::{classify, OnUnique, RepoError, RepoResult};
use crate::logging::{Field, Logger};

/// 세 저장소를 묶은 집합체. 상위 계층(HTTP/RPC)은 이것 하나만 받습니다.
#[derive(Clone)]
pub struct Repository {
    pub notes: Arc<dyn NoteRepository>,
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
}

impl Repository {
    pub fn new(db: &Database, logger: Arc<dyn Logger>) -> Self {
        Self {
            notes: Arc::new(PgNoteRepository::new(db.pool().clone(), logger.clone())),
            users: Arc::new(PgUserRepository::new(db.pool().clone(), logger.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenRepository::new(db.pool().clone(), logger)),
        }
    }
}

/// 쿼리 future를 컨텍스트 안에서 실행하고 실패를 분류합니다.
pub(crate) async fn exec<T, F>(ctx: &Context, on_unique: OnUnique, fut: F) -> RepoResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match ctx.run(fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(classify(ctx, err, on_unique)),
        Err(ctx_err) => Err(RepoError::Timeout(Box::new(ctx_err))),
    }
}

/// UPDATE/DELETE의 영향받은 행 수가 0이면 `NotFound`
pub(crate) fn expect_affected(rows_affected: u64) -> RepoResult<()> {
    if rows_affected == 0 {
        Err(RepoError::no_rows())
    } else {
        Ok(())
    }
}

/// 연산 하나의 시작/종료 로그를 담당합니다.
pub(crate) struct Op<'a> {
    logger: &'a dyn Logger,
    entity: &'static str,
    operation: &'static str,
    ids: Vec<Field>,
    started: Instant,
}

impl<'a> Op<'a> {
    /// `ids`는 실패 로그에도 다시 실리는 식별자, `params`는 시작 로그에만 실립니다.
    pub(crate) fn start(
        logger: &'a dyn Logger,
        entity: &'static str,
        operation: &'static str,
        ids: Vec<Field>,
        params: Vec<Field>,
    ) -> Self {
        let mut fields = ids.clone();
        fields.extend(params);
        logger.debug(
            &format!("monitor[{entity}]: starting {entity} db {operation}"),
            &fields,
        );

        Self {
            logger,
            entity,
            operation,
            ids,
            started: Instant::now(),
        }
    }

    pub(crate) fn finish<T>(
        self,
        result: RepoResult<T>,
        done: impl FnOnce(&T) -> Vec<Field>,
    ) -> RepoResult<T> {
        let duration = self.started.elapsed();
        match &result {
            Ok(value) => {
                let mut fields = done(value);
                fields.push(Field::new("operation", self.operation));
                fields.push(Field::new("duration", duration));
                self.logger.info(
                    &format!("done[{}]: {} succeeded", self.entity, self.operation),
                    &fields,
                );
            }
            Err(err) => {
                let mut fields = self.ids;
                fields.push(Field::new("operation", self.operation));
                fields.push(Field::new("duration", duration));
                fields.push(Field::new("kind", err.kind().as_str()));
                fields.push(Field::new("error", err.to_string()));
                self.logger
                    .error(&format!("fail[{}]: {}", self.entity, err.kind()), &fields);
            }
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;
    use tokio::time::Instant;

    use crate::config::DatabaseConfig;
    use crate::context::Context;

    /// 연결하지 않는 풀. 컨텍스트가 이미 끝난 경로를 서버 없이 검사할 때 씁니다.
    pub(crate) fn lazy_pool() -> PgPool {
        let mut config = DatabaseConfig::new("127.0.0.1", "notes", "pw", "notes");
        config.port = 1;
        PgPoolOptions::new().connect_lazy_with(config.connect_options())
    }

    pub(crate) fn expired() -> Context {
        Context::with_deadline(Instant::now() - std::time::Duration::from_millis(1))
    }

    pub(crate) fn cancelled() -> Context {
        let ctx = Context::background();
        ctx.cancel();
        ctx
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;
    use crate::error::ErrorKind;
    use crate::logging::{RecordingLogger, Value};

    #[test]
    fn zero_rows_affected_is_not_found() {
        assert!(expect_affected(1).is_ok());
        assert_eq!(expect_affected(0).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn exec_maps_context_expiry_to_timeout() {
        let ctx = testing::expired();
        let out: RepoResult<()> = exec(&ctx, OnUnique::Database, async {
            Ok::<(), sqlx::Error>(())
        })
        .await;
        assert_eq!(out.unwrap_err().kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn exec_classifies_driver_errors() {
        let ctx = Context::background();
        let out: RepoResult<()> = exec(&ctx, OnUnique::Database, async {
            Err::<(), _>(sqlx::Error::RowNotFound)
        })
        .await;
        assert_eq!(out.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn op_logs_entry_and_success() {
        let logger = RecordingLogger::new();
        let op = Op::start(
            &logger,
            "note",
            "get_by_id",
            vec![Field::new("id", 3i64)],
            vec![Field::new("owner_id", 9i64)],
        );
        let out = op.finish(Ok(5i64), |v| vec![Field::new("id", *v)]);
        assert_eq!(out.unwrap(), 5);

        let records = logger.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, Level::DEBUG);
        assert_eq!(records[0].message, "monitor[note]: starting note db get_by_id");
        assert_eq!(records[0].field("owner_id"), Some(&Value::Int(9)));
        assert_eq!(records[1].level, Level::INFO);
        assert_eq!(records[1].message, "done[note]: get_by_id succeeded");
        assert!(records[1].has_field("duration"));
    }

    #[test]
    fn op_logs_failure_with_operation_duration_and_error() {
        let logger = RecordingLogger::new();
        let op = Op::start(&logger, "user", "delete", vec![Field::new("id", 1i64)], vec![]);
        let out: RepoResult<()> = op.finish(Err(RepoError::no_rows()), |_| vec![]);
        assert!(out.is_err());

        let failure = &logger.at_level(Level::ERROR)[0];
        assert_eq!(failure.message, "fail[user]: not_found");
        assert_eq!(failure.field("id"), Some(&Value::Int(1)));
        assert_eq!(failure.field("operation"), Some(&Value::Str("delete".into())));
        assert_eq!(failure.field("kind"), Some(&Value::Str("not_found".into())));
        assert!(failure.has_field("duration"));
        assert!(failure.has_field("error"));
    }
}
