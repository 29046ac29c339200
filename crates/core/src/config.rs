//! 설정 관리 -- logstreamer.toml 파싱 및 런타임 설정
//!
//! [`LogstreamerConfig`]는 daemon과 스트리머 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGSTREAMER_STREAMER_BUS_CAPACITY=200` 형식)
//! 3. 설정 파일 (`logstreamer.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 설정 예시
//! ```toml
//! [streamer]
//! dirs = ["/var/log/nginx/"]
//!
//! [[group]]
//! mask = "^.*log$"
//! rules = ['\s\[(?P<date>[^\]]+)\]\s.*?"\s(?P<code>\d{3})\s(?P<size_value>\d+)']
//! name = "nginx"
//! date_format = "02/Jan/2006:15:04:05 -0700"
//! ```
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), logstreamer_core::error::LogstreamerError> {
//! use logstreamer_core::config::LogstreamerConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LogstreamerConfig::load("logstreamer.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LogstreamerConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LogstreamerError};

/// 허용되는 백프레셔 전략 이름
pub const BACKPRESSURE_STRATEGIES: [&str; 3] = ["block", "drop_oldest", "drop_newest"];

/// logstreamer 통합 설정
///
/// `logstreamer.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogstreamerConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스트리머 설정
    #[serde(default)]
    pub streamer: StreamerSection,
    /// 그룹 정의 목록 (`[[group]]` 테이블, 선언 순서 유지)
    #[serde(default)]
    pub group: Vec<GroupConfig>,
}

impl LogstreamerConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogstreamerError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogstreamerError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LogstreamerError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LogstreamerError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    ///
    /// 빈 `date_format`은 생략한 것으로 취급합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogstreamerError> {
        let mut config: Self = toml::from_str(toml_str).map_err(|e| {
            LogstreamerError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })?;
        for group in &mut config.group {
            if group.date_format().is_none() {
                group.date_format = None;
            }
        }
        Ok(config)
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGSTREAMER_{SECTION}_{FIELD}`.
    /// 그룹 정의는 환경변수로 오버라이드하지 않습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGSTREAMER_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGSTREAMER_GENERAL_LOG_FORMAT");

        // Streamer
        override_csv(&mut self.streamer.dirs, "LOGSTREAMER_STREAMER_DIRS");
        override_bool(
            &mut self.streamer.watch_new_files,
            "LOGSTREAMER_STREAMER_WATCH_NEW_FILES",
        );
        override_u64(
            &mut self.streamer.poll_interval_ms,
            "LOGSTREAMER_STREAMER_POLL_INTERVAL_MS",
        );
        override_u64(
            &mut self.streamer.removal_grace_ms,
            "LOGSTREAMER_STREAMER_REMOVAL_GRACE_MS",
        );
        override_usize(
            &mut self.streamer.max_line_length,
            "LOGSTREAMER_STREAMER_MAX_LINE_LENGTH",
        );
        override_usize(
            &mut self.streamer.bus_capacity,
            "LOGSTREAMER_STREAMER_BUS_CAPACITY",
        );
        override_string(
            &mut self.streamer.backpressure,
            "LOGSTREAMER_STREAMER_BACKPRESSURE",
        );
        override_u64(
            &mut self.streamer.drain_window_ms,
            "LOGSTREAMER_STREAMER_DRAIN_WINDOW_MS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 정규식 컴파일 검증은 스트리머가 그룹을 생성할 때 수행합니다.
    pub fn validate(&self) -> Result<(), LogstreamerError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if !BACKPRESSURE_STRATEGIES.contains(&self.streamer.backpressure.as_str()) {
            return Err(invalid(
                "streamer.backpressure",
                format!("must be one of: {}", BACKPRESSURE_STRATEGIES.join(", ")),
            ));
        }

        if self.streamer.dirs.iter().any(|d| d.trim().is_empty()) {
            return Err(invalid("streamer.dirs", "directory must not be empty"));
        }

        // 빈 마스크는 모든 파일에 매칭되고, 규칙이 없는 그룹은 메트릭을 만들지 않습니다.
        for (idx, group) in self.group.iter().enumerate() {
            if group.rules.is_empty() {
                warn!(group = idx, "group defines no rules, its files yield no metrics");
            }
        }

        Ok(())
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> LogstreamerError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 스트리머 설정 (`[streamer]` 섹션)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerSection {
    /// 재귀적으로 스캔할 루트 디렉토리 목록
    pub dirs: Vec<String>,
    /// 시작 후 새로 생성되는 파일 감시 여부
    pub watch_new_files: bool,
    /// 새 데이터 대기 시 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 파일이 사라진 뒤 tailer를 종료하기까지의 유예 시간 (밀리초)
    pub removal_grace_ms: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 메트릭 버스 용량
    pub bus_capacity: usize,
    /// 버스가 가득 찼을 때의 전략 (block, drop_oldest, drop_newest)
    pub backpressure: String,
    /// 한 번의 drain 윈도우 (밀리초)
    pub drain_window_ms: u64,
}

impl Default for StreamerSection {
    fn default() -> Self {
        Self {
            dirs: vec!["/var/log/nginx/".to_owned()],
            watch_new_files: true,
            poll_interval_ms: 250,
            removal_grace_ms: 5_000,
            max_line_length: 64 * 1024, // 64KB
            bus_capacity: 100,
            backpressure: "block".to_owned(),
            drain_window_ms: 1_000,
        }
    }
}

/// 그룹 정의 (`[[group]]` 테이블)
///
/// 정규식은 아직 컴파일되지 않은 문자열 상태입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// 파일 기본 이름에 적용할 마스크 정규식
    pub mask: String,
    /// 라인별로 적용할 규칙 정규식 목록 (선언 순서 유지)
    #[serde(default)]
    pub rules: Vec<String>,
    /// 그룹 이름 (생략 시 `group<N>`)
    #[serde(default)]
    pub name: Option<String>,
    /// `date` 캡처에 적용할 날짜 형식
    #[serde(default)]
    pub date_format: Option<String>,
}

impl GroupConfig {
    /// 비어 있지 않은 날짜 형식. 빈 문자열은 날짜 형식이 없는 것과 같습니다.
    pub fn date_format(&self) -> Option<&str> {
        self.date_format
            .as_deref()
            .filter(|format| !format.trim().is_empty())
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = LogstreamerConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.streamer.bus_capacity, 100);
        assert_eq!(config.streamer.drain_window_ms, 1_000);
        assert_eq!(config.streamer.backpressure, "block");
        assert!(config.streamer.watch_new_files);
        assert!(config.group.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        LogstreamerConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let config = LogstreamerConfig::parse("").unwrap();
        assert_eq!(config.streamer.poll_interval_ms, 250);
        assert!(config.group.is_empty());
    }

    #[test]
    fn parse_groups_in_declaration_order() {
        let toml = r#"
[streamer]
dirs = ["/var/log/app"]

[[group]]
mask = "^access.*log$"
rules = ['(?P<code>\d{3})']
name = "access"
date_format = "02/Jan/2006:15:04:05 -0700"

[[group]]
mask = "^error.*log$"
rules = ['ERROR (?P<module>\w+)', 'WARN (?P<module>\w+)']
"#;
        let config = LogstreamerConfig::parse(toml).unwrap();
        assert_eq!(config.streamer.dirs, vec!["/var/log/app"]);
        assert_eq!(config.group.len(), 2);
        assert_eq!(config.group[0].name.as_deref(), Some("access"));
        assert_eq!(
            config.group[0].date_format.as_deref(),
            Some("02/Jan/2006:15:04:05 -0700")
        );
        assert!(config.group[1].name.is_none());
        assert_eq!(config.group[1].rules.len(), 2);
        config.validate().unwrap();
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = LogstreamerConfig::parse("[streamer\ndirs = 3").unwrap_err();
        assert!(matches!(
            err,
            LogstreamerError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LogstreamerConfig::default();
        config.general.log_level = "verbose".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_backpressure() {
        let mut config = LogstreamerConfig::default();
        config.streamer.backpressure = "spill".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("streamer.backpressure"));
    }

    #[test]
    fn validate_accepts_empty_mask_and_rules() {
        let mut config = LogstreamerConfig::default();
        config.group.push(GroupConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn parse_empty_date_format_means_none() {
        let toml = r#"
[[group]]
mask = ""
rules = ['(?P<x>.)']
date_format = ""

[[group]]
mask = "log$"
date_format = "  "
"#;
        let config = LogstreamerConfig::parse(toml).unwrap();
        assert_eq!(config.group[0].date_format, None);
        assert_eq!(config.group[1].date_format, None);
        assert!(config.group[1].rules.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn group_date_format_accessor_skips_blank() {
        let mut group = GroupConfig {
            date_format: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(group.date_format(), None);

        group.date_format = Some("2006-01-02".to_owned());
        assert_eq!(group.date_format(), Some("2006-01-02"));
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serial 테스트에서만 환경변수를 변경합니다.
        unsafe { std::env::set_var("TEST_LOGSTREAMER_STR", "overridden") };
        override_string(&mut val, "TEST_LOGSTREAMER_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_LOGSTREAMER_STR") };
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = true;
        unsafe { std::env::set_var("TEST_LOGSTREAMER_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_LOGSTREAMER_BOOL_BAD");
        assert!(val);
        unsafe { std::env::remove_var("TEST_LOGSTREAMER_BOOL_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_csv_skips_blanks() {
        let mut val = vec!["a".to_owned()];
        unsafe { std::env::set_var("TEST_LOGSTREAMER_CSV", "/var/log/a, ,/var/log/b") };
        override_csv(&mut val, "TEST_LOGSTREAMER_CSV");
        assert_eq!(val, vec!["/var/log/a", "/var/log/b"]);
        unsafe { std::env::remove_var("TEST_LOGSTREAMER_CSV") };
    }

    #[test]
    #[serial]
    fn apply_env_overrides_updates_streamer() {
        let mut config = LogstreamerConfig::default();
        unsafe { std::env::set_var("LOGSTREAMER_STREAMER_BUS_CAPACITY", "250") };
        unsafe { std::env::set_var("LOGSTREAMER_STREAMER_BACKPRESSURE", "drop_oldest") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("LOGSTREAMER_STREAMER_BUS_CAPACITY") };
        unsafe { std::env::remove_var("LOGSTREAMER_STREAMER_BACKPRESSURE") };
        assert_eq!(config.streamer.bus_capacity, 250);
        assert_eq!(config.streamer.backpressure, "drop_oldest");
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = LogstreamerConfig::from_file("/nonexistent/logstreamer.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogstreamerError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
