//! # personal-notes 진입점
//!
//! 저장소 계층을 조립만 하는 얇은 바이너리입니다.
//! 1. 환경변수(.env) 로딩
//! 2. 설정 읽기
//! 3. 로깅(tracing) 초기화
//! 4. 연결 풀 생성 + 연결 확인
//! 5. 저장소 집합체 생성
//! 6. Ctrl-C까지 대기 후 풀 종료

use std::sync::Arc;

use anyhow::{Context as _, Result};
use personal_notes::{logging, Config, Context, Database, Logger, Repository, TracingLogger};
use tracing::Instrument;

#[tokio::main]
async fn main() -> Result<()> {
    // .env가 없어도 괜찮습니다.
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("fail[config]")?;
    logging::init(config.is_production(), config.log_format).context("fail[logger]")?;
    tracing::info!("init[logger]: successfully initialized");

    run(config)
        .instrument(tracing::info_span!("service", service = "personal_notes_api"))
        .await
}

async fn run(config: Config) -> Result<()> {
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);

    let ctx = Context::with_timeout(config.database.connect_timeout);
    let db = Database::open(&ctx, &config.database, logger.as_ref())
        .await
        .context("fail[db]: failed to initialize db connection")?;
    tracing::info!(
        database = %config.database.name,
        dsn = %config.database.redacted_dsn(),
        "init[db]: successfully initialized db connection"
    );

    let _repository = Repository::new(&db, logger);
    tracing::info!(port = config.port, "ready: repository layer initialized");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    db.close().await;
    tracing::info!(database = %config.database.name, "db connection closed");
    Ok(())
}
