use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 새 노트 입력. id와 created_at은 저장소가 채웁니다.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewNote {
    pub owner_id: i64,
    pub title: String,
    pub body: Option<String>,
}

impl NewNote {
    pub fn new(owner_id: i64, title: impl Into<String>, body: Option<String>) -> Self {
        Self {
            owner_id,
            title: title.into(),
            body,
        }
    }
}
