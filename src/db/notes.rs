//! # 노트 저장소
//!
//! 노트는 항상 `(id, owner_id)` 쌍으로만 읽고/쓰고/지웁니다.
//! id만으로 접근하는 경로는 없습니다. 다른 사용자의 노트 id를 추측해도
//! owner_id가 맞지 않으면 0행 → `NotFound`가 되어 존재 여부조차 드러나지 않습니다.
//!
//! 모든 연산은 SQL 한 문장으로 끝납니다. (읽고-고치고-쓰기 없음)

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{OnUnique, RepoError, RepoResult};
use crate::logging::{Field, Logger};
use crate::models::{NewNote, Note};

use super::{exec, expect_affected, Op};

const ENTITY: &str = "note";

const SQL_CREATE_NOTE: &str = r#"
    INSERT INTO notes (owner_id, title, body, created_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id, owner_id, title, body, created_at, updated_at
"#;

const SQL_GET_NOTE: &str = r#"
    SELECT id, owner_id, title, body, created_at, updated_at
    FROM notes
    WHERE id = $1 AND owner_id = $2
"#;

const SQL_UPDATE_NOTE: &str = r#"
    UPDATE notes
    SET title = $3,
        body = $4,
        updated_at = $5
    WHERE id = $1 AND owner_id = $2
    RETURNING id, owner_id, title, body, created_at, updated_at
"#;

const SQL_DELETE_NOTE: &str = r#"
    DELETE FROM notes
    WHERE id = $1 AND owner_id = $2
"#;

#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// created_at을 현재 시각으로 찍고 삽입합니다. 저장소가 부여한 id가 담긴 행을 반환합니다.
    async fn create(&self, ctx: &Context, note: NewNote) -> RepoResult<Note>;

    /// (id, owner_id)가 모두 일치하는 노트. 없으면 `NotFound`
    async fn get_by_id(&self, ctx: &Context, id: i64, owner_id: i64) -> RepoResult<Note>;

    /// `note.id`, `note.owner_id`가 일치하는 행의 title/body를 바꾸고 updated_at을 찍습니다.
    /// created_at은 건드리지 않습니다.
    async fn update(&self, ctx: &Context, note: &Note) -> RepoResult<Note>;

    async fn delete(&self, ctx: &Context, id: i64, owner_id: i64) -> RepoResult<()>;
}

pub struct PgNoteRepository {
    pool: PgPool,
    logger: Arc<dyn Logger>,
}

impl PgNoteRepository {
    pub fn new(pool: PgPool, logger: Arc<dyn Logger>) -> Self {
        Self { pool, logger }
    }

    fn op(&self, operation: &'static str, ids: Vec<Field>, params: Vec<Field>) -> Op<'_> {
        Op::start(self.logger.as_ref(), ENTITY, operation, ids, params)
    }
}

fn note_ids(note: &Note) -> Vec<Field> {
    vec![
        Field::new("id", note.id),
        Field::new("owner_id", note.owner_id),
    ]
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn create(&self, ctx: &Context, note: NewNote) -> RepoResult<Note> {
        let created_at = Utc::now();
        // 본문(body)은 로그에 남기지 않습니다.
        let op = self.op(
            "insert",
            vec![Field::new("owner_id", note.owner_id)],
            vec![
                Field::new("title", &note.title),
                Field::new("has_body", note.body.is_some()),
                Field::new("created_at", created_at),
            ],
        );

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query_as::<_, Note>(SQL_CREATE_NOTE)
                .bind(note.owner_id)
                .bind(&note.title)
                .bind(&note.body)
                .bind(created_at)
                .fetch_one(&self.pool),
        )
        .await;

        op.finish(result, note_ids)
    }

    async fn get_by_id(&self, ctx: &Context, id: i64, owner_id: i64) -> RepoResult<Note> {
        let op = self.op(
            "get_by_id",
            vec![Field::new("id", id), Field::new("owner_id", owner_id)],
            vec![],
        );

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query_as::<_, Note>(SQL_GET_NOTE)
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool),
        )
        .await
        .and_then(|row| row.ok_or_else(RepoError::no_rows));

        op.finish(result, note_ids)
    }

    async fn update(&self, ctx: &Context, note: &Note) -> RepoResult<Note> {
        let updated_at = Utc::now();
        let op = self.op(
            "update",
            note_ids(note),
            vec![
                Field::new("title", &note.title),
                Field::new("has_body", note.body.is_some()),
                Field::new("updated_at", updated_at),
            ],
        );

        // RETURNING이 0행 = 영향받은 행 0 = (id, owner_id) 불일치
        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query_as::<_, Note>(SQL_UPDATE_NOTE)
                .bind(note.id)
                .bind(note.owner_id)
                .bind(&note.title)
                .bind(&note.body)
                .bind(updated_at)
                .fetch_optional(&self.pool),
        )
        .await
        .and_then(|row| row.ok_or_else(RepoError::no_rows));

        op.finish(result, note_ids)
    }

    async fn delete(&self, ctx: &Context, id: i64, owner_id: i64) -> RepoResult<()> {
        let op = self.op(
            "delete",
            vec![Field::new("id", id), Field::new("owner_id", owner_id)],
            vec![],
        );

        let result = exec(
            ctx,
            OnUnique::Database,
            sqlx::query(SQL_DELETE_NOTE)
                .bind(id)
                .bind(owner_id)
                .execute(&self.pool),
        )
        .await
        .and_then(|done| expect_affected(done.rows_affected()));

        op.finish(result, |_| {
            vec![Field::new("id", id), Field::new("owner_id", owner_id)]
        })
    }
}
