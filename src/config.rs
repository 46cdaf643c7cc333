//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 설정값을 읽어옵니다. `.env` 파일은 바이너리(main)가
//! `dotenvy`로 먼저 로딩합니다.
//!
//! 설정 항목:
//! - `APP_ENV`: 실행 환경 (기본값: "development")
//! - `PORT`: 서비스 포트 (기본값: 8080)
//! - `LOG_FORMAT`: "console" | "json" (기본값: "console")
//! - `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`: 필수
//! - `DB_PORT`: 기본값 5432
//! - `DB_SSLMODE`: 기본값 "disable"
//! - `DB_MAX_CONNS`: 풀 최대 연결 수 (기본값: 25)
//! - `DB_MAX_CONN_LIFETIME_SECS`: 연결 최대 수명 (기본값: 3600)
//! - `DB_CONNECT_TIMEOUT_SECS`: 시작 시 ping에 허용하는 시간 (기본값: 5)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, Secret};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// 로그 출력 형식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// libpq의 sslmode 값
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    #[default]
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl FromStr for SslMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            _ => Err(()),
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// 저장소(PostgreSQL) 연결 설정
///
/// 비밀번호는 `Secret`으로 감싸서 `Debug` 출력에 나타나지 않습니다.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub name: String,
    pub ssl_mode: SslMode,
    /// 풀의 최대 동시 연결 수
    pub max_connections: u32,
    /// 연결 하나의 최대 수명. 지나면 풀이 연결을 새로 맺습니다.
    pub max_lifetime: Duration,
    /// 시작 시 연결 확인(ping)에 허용하는 시간
    pub connect_timeout: Duration,
}

impl DatabaseConfig {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 25;
    pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(60 * 60);
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// 필수 항목만으로 설정을 만듭니다. 나머지는 기본값입니다.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: 5432,
            user: user.into(),
            password: Secret::new(password.into()),
            name: name.into(),
            ssl_mode: SslMode::default(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            max_lifetime: Self::DEFAULT_MAX_LIFETIME,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// sqlx 연결 옵션을 조립합니다. `~/.pgpass`는 읽지 않습니다.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(self.password.expose_secret())
            .database(&self.name)
            .ssl_mode(self.ssl_mode.into())
    }

    /// libpq 형식의 연결 문자열. 비밀번호가 그대로 들어 있으므로 로그에 쓰지 마세요.
    pub fn dsn(&self) -> String {
        self.render_dsn(self.password.expose_secret())
    }

    /// 로그용 연결 문자열 (비밀번호 마스킹)
    pub fn redacted_dsn(&self) -> String {
        self.render_dsn("***")
    }

    fn render_dsn(&self, password: &str) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode={}",
            self.host,
            self.port,
            self.user,
            password,
            self.name,
            self.ssl_mode.as_str()
        )
    }
}

/// 애플리케이션 전체 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: String,
    pub port: u16,
    pub log_format: LogFormat,
    pub database: DatabaseConfig,
}

impl Config {
    /// 프로세스 환경변수에서 설정을 읽습니다.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 임의의 조회 함수로 설정을 읽습니다. 테스트에서 환경변수 대신 사용합니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Lookup(lookup);

        let database = DatabaseConfig {
            host: vars.required("DB_HOST")?,
            port: vars.parsed("DB_PORT", 5432)?,
            user: vars.required("DB_USER")?,
            password: Secret::new(vars.required("DB_PASSWORD")?),
            name: vars.required("DB_NAME")?,
            ssl_mode: vars.parsed("DB_SSLMODE", SslMode::Disable)?,
            max_connections: vars
                .parsed("DB_MAX_CONNS", DatabaseConfig::DEFAULT_MAX_CONNECTIONS)?,
            max_lifetime: Duration::from_secs(vars.parsed(
                "DB_MAX_CONN_LIFETIME_SECS",
                DatabaseConfig::DEFAULT_MAX_LIFETIME.as_secs(),
            )?),
            connect_timeout: Duration::from_secs(vars.parsed(
                "DB_CONNECT_TIMEOUT_SECS",
                DatabaseConfig::DEFAULT_CONNECT_TIMEOUT.as_secs(),
            )?),
        };

        if database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_MAX_CONNS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            app_env: vars
                .optional("APP_ENV")
                .unwrap_or_else(|| "development".to_string()),
            port: vars.parsed("PORT", 8080)?,
            log_format: vars.parsed("LOG_FORMAT", LogFormat::Console)?,
            database,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// 비어 있는 값은 없는 것으로 취급
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parsed<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value: raw }),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("DB_HOST", "db.internal"),
        ("DB_USER", "notes"),
        ("DB_PASSWORD", "s3cret"),
        ("DB_NAME", "notes"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let cfg = load(REQUIRED).unwrap();
        assert_eq!(cfg.app_env, "development");
        assert!(!cfg.is_production());
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.log_format, LogFormat::Console);
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.database.ssl_mode, SslMode::Disable);
        assert_eq!(cfg.database.max_connections, 25);
        assert_eq!(cfg.database.max_lifetime, Duration::from_secs(3600));
        assert_eq!(cfg.database.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let err = load(&REQUIRED[..3]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DB_NAME"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DB_SSLMODE", "sometimes"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::Invalid { key: "DB_SSLMODE", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DB_PORT", "not-a-port"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::Invalid { key: "DB_PORT", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DB_MAX_CONNS", "0"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::Invalid { key: "DB_MAX_CONNS", .. })
        ));
    }

    #[test]
    fn production_json_and_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("APP_ENV", "production"),
            ("LOG_FORMAT", "JSON"),
            ("DB_PORT", "6543"),
            ("DB_SSLMODE", "verify-full"),
            ("DB_MAX_CONNS", "10"),
        ]);
        let cfg = load(&pairs).unwrap();
        assert!(cfg.is_production());
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.database.port, 6543);
        assert_eq!(cfg.database.ssl_mode, SslMode::VerifyFull);
        assert_eq!(cfg.database.max_connections, 10);
    }

    #[test]
    fn dsn_and_redaction() {
        let cfg = load(REQUIRED).unwrap();
        assert_eq!(
            cfg.database.dsn(),
            "host=db.internal port=5432 user=notes password=s3cret dbname=notes sslmode=disable"
        );
        let redacted = cfg.database.redacted_dsn();
        assert!(redacted.contains("password=***"));
        assert!(!redacted.contains("s3cret"));
        assert!(!format!("{:?}", cfg.database).contains("s3cret"));
    }

    #[test]
    fn connect_options_carry_host_and_database() {
        let db = DatabaseConfig::new("localhost", "u", "p", "notes");
        let opts = db.connect_options();
        assert_eq!(opts.get_host(), "localhost");
        assert_eq!(opts.get_port(), 5432);
        assert_eq!(opts.get_database(), Some("notes"));
        assert_eq!(opts.get_username(), "u");
    }
}
