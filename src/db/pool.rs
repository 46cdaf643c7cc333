//! # 연결 풀 제공자
//!
//! 프로세스당 하나의 `Database`를 시작 시 만들고, 모든 저장소가
//! 같은 풀 핸들을 공유합니다. (`PgPool`은 내부적으로 Arc이므로 clone해도
//! 같은 풀을 가리킵니다.)
//!
//! ## 라이프사이클
//! ```text
//! open() → [lazy 풀 생성] → ping(SELECT 1) ─ 실패 → close() 후 에러
//!                                         └ 성공 → 사용 → close() (종료 시 1회)
//! ```

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::context::Context;
use crate::error::{OnUnique, RepoResult};
use crate::logging::{Field, Logger};

use super::exec;

/// 공유 연결 풀 핸들
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 풀을 만들고 연결을 한 번 확인합니다.
    ///
    /// - 최대 연결 수 / 연결 최대 수명은 `config`에서 가져옵니다 (기본 25개, 1시간).
    /// - 연결 확인은 `ctx`의 deadline 안에 끝나야 합니다. 실패하면 풀을 닫고
    ///   `Timeout`(deadline 초과) 또는 `Database` 에러를 반환합니다.
    pub async fn open(
        ctx: &Context,
        config: &DatabaseConfig,
        logger: &dyn Logger,
    ) -> RepoResult<Self> {
        let fields = vec![
            Field::new("host", &config.host),
            Field::new("port", i64::from(config.port)),
            Field::new("database", &config.name),
            Field::new("sslmode", config.ssl_mode.as_str()),
            Field::new("max_connections", i64::from(config.max_connections)),
            Field::new("max_lifetime", config.max_lifetime),
        ];
        logger.debug("monitor[db]: opening connection pool", &fields);

        Self::lazy(config).verified(ctx, logger, fields).await
    }

    // 실제 연결은 첫 acquire(여기서는 ping) 때 맺어집니다.
    fn lazy(config: &DatabaseConfig) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .max_lifetime(config.max_lifetime)
            .connect_lazy_with(config.connect_options());
        Self { pool }
    }

    /// ping이 실패하면 풀을 닫고 에러를 돌려줍니다.
    async fn verified(
        self,
        ctx: &Context,
        logger: &dyn Logger,
        mut fields: Vec<Field>,
    ) -> RepoResult<Self> {
        if let Err(err) = self.ping(ctx).await {
            self.close().await;
            fields.push(Field::new("kind", err.kind().as_str()));
            fields.push(Field::new("error", err.to_string()));
            logger.error("fail[db]: connection check failed", &fields);
            return Err(err);
        }

        logger.info("done[db]: connection pool ready", &fields);
        Ok(self)
    }

    /// 이미 만들어진 풀을 감쌉니다. (테스트 픽스처 등)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// `SELECT 1`로 연결 상태를 확인합니다.
    pub async fn ping(&self, ctx: &Context) -> RepoResult<()> {
        exec(
            ctx,
            OnUnique::Database,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await
        .map(|_| ())
    }

    /// 모든 연결을 닫습니다. 여러 번 호출해도 안전합니다.
    pub async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
