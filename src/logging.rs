//! # 로깅 협력자(Logger)와 로거 초기화
//!
//! 저장소는 구체적인 로깅 백엔드를 모릅니다. 대신 `Logger` 트레이트에
//! 메시지와 순서 있는 key/value 필드 목록을 넘깁니다.
//!
//! - `TracingLogger`: 운영용 구현. `tracing` 이벤트로 전달합니다.
//! - `RecordingLogger`: 호출 내용을 메모리에 쌓아두는 구현 (테스트/진단용)
//! - `init()`: 프로세스 시작 시 `tracing-subscriber`를 설치합니다.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

/// 로그 필드 값
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
    Duration(Duration),
    Time(DateTime<Utc>),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Duration(v) => write!(f, "{v:?}"),
            Value::Time(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Value::Null => f.write_str("null"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Str(v.clone())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// key/value 한 쌍
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: &'static str,
    pub value: Value,
}

impl Field {
    pub fn new(key: &'static str, value: impl Into<Value>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// `key=value key=value` 형태로 필드를 출력 (`extra` 필드용)
struct Fields<'a>(&'a [Field]);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", field.key, field.value)?;
        }
        Ok(())
    }
}

/// 저장소가 사용하는 구조화 로거
pub trait Logger: Send + Sync {
    fn debug(&self, msg: &str, fields: &[Field]);
    fn info(&self, msg: &str, fields: &[Field]);
    fn warn(&self, msg: &str, fields: &[Field]);
    fn error(&self, msg: &str, fields: &[Field]);
}

/// 저장소가 남기는 필드 이름. 각각 `tracing` 이벤트의 독립된 필드가 됩니다.
/// 목록에 없는 키는 `extra` 필드에 `key=value` 형태로 모입니다.
const KNOWN_KEYS: [&str; 24] = [
    "operation",
    "duration",
    "kind",
    "error",
    "id",
    "owner_id",
    "user_id",
    "email",
    "name",
    "title",
    "has_body",
    "created_at",
    "updated_at",
    "last_login_at",
    "expires_at",
    "revoked_at",
    "replaced_by_token",
    "removed",
    "host",
    "port",
    "database",
    "sslmode",
    "max_connections",
    "max_lifetime",
];

/// `tracing` 필드로 기록할 수 있는 형태의 값
enum Recorded<'a> {
    Int(i64),
    Bool(bool),
    Str(&'a str),
    Text(String),
}

impl<'a> Recorded<'a> {
    // Null은 기록하지 않습니다. (필드 자체가 빠짐)
    fn from_value(value: &'a Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(Self::Int(*v)),
            Value::Bool(v) => Some(Self::Bool(*v)),
            Value::Str(v) => Some(Self::Str(v)),
            Value::Duration(_) | Value::Time(_) => Some(Self::Text(value.to_string())),
            Value::Null => None,
        }
    }

    fn as_value(&self) -> &dyn tracing::Value {
        match self {
            Self::Int(v) => v,
            Self::Bool(v) => v,
            Self::Str(v) => v,
            Self::Text(v) => v,
        }
    }
}

/// 필드 목록을 이름별로 찾아 쓰기 위한 중간 형태
struct Event<'a> {
    known: Vec<(&'static str, Recorded<'a>)>,
    extra: Vec<Field>,
}

impl<'a> Event<'a> {
    fn new(fields: &'a [Field]) -> Self {
        let mut known = Vec::with_capacity(fields.len());
        let mut extra = Vec::new();
        for field in fields {
            if KNOWN_KEYS.contains(&field.key) {
                if let Some(value) = Recorded::from_value(&field.value) {
                    known.push((field.key, value));
                }
            } else {
                extra.push(field.clone());
            }
        }
        Self { known, extra }
    }

    fn get(&self, key: &str) -> Option<&dyn tracing::Value> {
        self.known
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_value())
    }

    fn extra(&self) -> Option<tracing::field::DisplayValue<Fields<'_>>> {
        (!self.extra.is_empty()).then(|| tracing::field::display(Fields(&self.extra)))
    }
}

// event!의 level은 callsite 메타데이터에 들어가므로 상수여야 합니다.
macro_rules! emit {
    ($level:expr, $msg:expr, $fields:expr) => {{
        let event = Event::new($fields);
        tracing::event!(
            target: "personal_notes::repo",
            $level,
            operation = event.get("operation"),
            duration = event.get("duration"),
            kind = event.get("kind"),
            error = event.get("error"),
            id = event.get("id"),
            owner_id = event.get("owner_id"),
            user_id = event.get("user_id"),
            email = event.get("email"),
            name = event.get("name"),
            title = event.get("title"),
            has_body = event.get("has_body"),
            created_at = event.get("created_at"),
            updated_at = event.get("updated_at"),
            last_login_at = event.get("last_login_at"),
            expires_at = event.get("expires_at"),
            revoked_at = event.get("revoked_at"),
            replaced_by_token = event.get("replaced_by_token"),
            removed = event.get("removed"),
            host = event.get("host"),
            port = event.get("port"),
            database = event.get("database"),
            sslmode = event.get("sslmode"),
            max_connections = event.get("max_connections"),
            max_lifetime = event.get("max_lifetime"),
            extra = event.extra(),
            "{}",
            $msg
        );
    }};
}

/// `tracing`으로 전달하는 운영용 로거
///
/// 필드 하나가 이벤트 필드 하나가 됩니다. `LOG_FORMAT=json`이면
/// `fields.operation`, `fields.id`처럼 각자 JSON 키로 출력됩니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, msg: &str, fields: &[Field]) {
        emit!(Level::DEBUG, msg, fields);
    }

    fn info(&self, msg: &str, fields: &[Field]) {
        emit!(Level::INFO, msg, fields);
    }

    fn warn(&self, msg: &str, fields: &[Field]) {
        emit!(Level::WARN, msg, fields);
    }

    fn error(&self, msg: &str, fields: &[Field]) {
        emit!(Level::ERROR, msg, fields);
    }
}

/// `RecordingLogger`에 쌓인 한 건
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub fields: Vec<Field>,
}

impl Record {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }
}

/// 호출을 메모리에 기록하는 로거
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<Record>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn push(&self, level: Level, msg: &str, fields: &[Field]) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Record {
                level,
                message: msg.to_owned(),
                fields: fields.to_vec(),
            });
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, msg: &str, fields: &[Field]) {
        self.push(Level::DEBUG, msg, fields);
    }

    fn info(&self, msg: &str, fields: &[Field]) {
        self.push(Level::INFO, msg, fields);
    }

    fn warn(&self, msg: &str, fields: &[Field]) {
        self.push(Level::WARN, msg, fields);
    }

    fn error(&self, msg: &str, fields: &[Field]) {
        self.push(Level::ERROR, msg, fields);
    }
}

/// 전역 tracing subscriber를 설치합니다.
///
/// - `RUST_LOG`가 있으면 그 값을, 없으면 환경별 기본값을 사용합니다.
///   (production: info, 그 외: debug)
/// - `LogFormat::Json`이면 한 줄 JSON, `Console`이면 사람이 읽는 포맷
pub fn init(
    production: bool,
    format: LogFormat,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let default_filter = if production {
        "personal_notes=info,sqlx=warn"
    } else {
        "personal_notes=debug,sqlx=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // 두 레이어 중 하나만 Some. Option<Layer>도 Layer입니다.
    let (json, console) = match format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Console => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(console)
        .try_init()
}
