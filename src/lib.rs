//! # personal-notes 영속성 계층
//!
//! 개인 노트 서비스의 User / Note / RefreshToken을 PostgreSQL에 저장하고 조회합니다.
//!
//! 모듈 구성:
//! - `config`: 환경변수 설정 (`Config`, `DatabaseConfig`)
//! - `context`: 호출자가 넘기는 deadline/취소 신호 (`Context`)
//! - `error`: 4가지 에러 분류 (`RepoError`, `ErrorKind`)
//! - `logging`: 로깅 협력자 트레이트와 구현, subscriber 초기화
//! - `models`: 엔티티 구조체
//! - `db`: 연결 풀(`Database`)과 엔티티별 저장소, 집합체(`Repository`)
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use personal_notes::{
//!     Context, Database, DatabaseConfig, NewNote, NoteRepository, Repository, TracingLogger,
//! };
//!
//! # async fn demo() -> Result<(), personal_notes::RepoError> {
//! let logger = Arc::new(TracingLogger);
//! let config = DatabaseConfig::new("localhost", "notes", "secret", "notes");
//! let startup = Context::with_timeout(Duration::from_secs(5));
//! let db = Database::open(&startup, &config, logger.as_ref()).await?;
//! let repo = Repository::new(&db, logger);
//!
//! let ctx = Context::with_timeout(Duration::from_secs(2));
//! let note = repo.notes.create(&ctx, NewNote::new(1, "groceries", None)).await?;
//! let same = repo.notes.get_by_id(&ctx, note.id, note.owner_id).await?;
//! assert_eq!(note, same);
//! db.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;

pub use config::{Config, ConfigError, DatabaseConfig, LogFormat, SslMode};
pub use context::{Context, ContextError};
pub use db::{
    Database, NoteRepository, PgNoteRepository, PgRefreshTokenRepository, PgUserRepository,
    RefreshTokenRepository, Repository, UserRepository,
};
pub use error::{ErrorKind, RepoError, RepoResult};
pub use logging::{Field, Logger, RecordingLogger, TracingLogger, Value};
pub use models::{hash_token, NewNote, NewRefreshToken, NewUser, Note, RefreshToken, User};
