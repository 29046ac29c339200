//! 로그 스트림 에러 타입
//!
//! [`LogStreamError`]는 그룹 생성, 파일 탐색, tail, 감시, 리포트 과정에서
//! 발생하는 모든 에러를 표현합니다.
//! `From<LogStreamError> for LogstreamerError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! # 전파 정책
//! - 시작 시점 에러 (`Construction`, `Discovery`, `Open`, `WatchSetup`)는 호출자에게
//!   그대로 반환되어 시작을 막습니다.
//! - 런타임 라인 단위 에러 (`DateParse`, `WatchRuntime`)는 로그와 카운터로만
//!   남기고 처리를 계속합니다.

use std::fmt;

use logstreamer_core::error::{LogstreamerError, PipelineError};

/// 로그 스트림 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogStreamError {
    /// 마스크/규칙/날짜 형식 생성 실패
    #[error("construction error: {what}: {reason}")]
    Construction {
        /// 생성하려던 대상 (예: "group 'nginx' mask")
        what: String,
        /// 실패 사유
        reason: String,
    },

    /// 디렉토리 탐색 실패
    #[error("discovery error: {path}: {reason}")]
    Discovery {
        /// 탐색하던 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// tail 대상 파일 열기 실패
    #[error("cannot open '{path}' for group '{group}': {reason}")]
    Open {
        /// 파일 경로
        path: String,
        /// 바인딩하려던 그룹 이름
        group: String,
        /// 실패 사유
        reason: String,
    },

    /// 디렉토리 감시 설정 실패
    #[error("watch setup error: {path}: {reason}")]
    WatchSetup {
        /// 감시 대상 디렉토리
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 감시 알림 전달 실패
    #[error("watch runtime error: {0}")]
    WatchRuntime(String),

    /// 날짜 필드 파싱 실패
    #[error("can't parse date '{raw}' with format '{format}': {reason}")]
    DateParse {
        /// 원본 날짜 문자열
        raw: String,
        /// 그룹의 날짜 형식
        format: String,
        /// 실패 사유
        reason: String,
    },

    /// 접미어 타입 필드 변환 실패 (배치 내 모든 실패를 모음)
    #[error("can't add metric: {}", join_failures(.0))]
    Coercion(Vec<FieldCoercionError>),

    /// 메트릭 버스가 닫힘
    #[error("metric bus closed")]
    BusClosed,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 단일 필드의 숫자 변환 실패
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCoercionError {
    /// 메트릭을 만든 그룹 이름
    pub group: String,
    /// 원본 필드 이름 (접미어 포함)
    pub key: String,
    /// 변환하지 못한 값
    pub value: String,
}

impl fmt::Display for FieldCoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "can't parse '{}:{}' as numeric value (group '{}')",
            self.key, self.value, self.group
        )
    }
}

fn join_failures(failures: &[FieldCoercionError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<LogStreamError> for LogstreamerError {
    fn from(err: LogStreamError) -> Self {
        match err {
            LogStreamError::BusClosed => LogstreamerError::Pipeline(PipelineError::BusClosed),
            LogStreamError::Io(e) => LogstreamerError::Io(e),
            other => LogstreamerError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_error_display() {
        let err = LogStreamError::Construction {
            what: "group 'nginx' mask".to_owned(),
            reason: "unclosed group".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("nginx"));
        assert!(msg.contains("unclosed group"));
    }

    #[test]
    fn date_parse_error_display() {
        let err = LogStreamError::DateParse {
            raw: "yesterday".to_owned(),
            format: "02/Jan/2006".to_owned(),
            reason: "input contains invalid characters".to_owned(),
        };
        assert!(err.to_string().starts_with("can't parse date 'yesterday'"));
    }

    #[test]
    fn coercion_errors_are_aggregated() {
        let err = LogStreamError::Coercion(vec![
            FieldCoercionError {
                group: "nginx".to_owned(),
                key: "size_value".to_owned(),
                value: "abc".to_owned(),
            },
            FieldCoercionError {
                group: "nginx".to_owned(),
                key: "time_value".to_owned(),
                value: "-".to_owned(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("can't add metric: "));
        assert!(msg.contains("'size_value:abc'"));
        assert!(msg.contains("'time_value:-'"));
    }

    #[test]
    fn converts_to_logstreamer_error() {
        let err: LogstreamerError = LogStreamError::BusClosed.into();
        assert!(matches!(
            err,
            LogstreamerError::Pipeline(PipelineError::BusClosed)
        ));

        let err: LogstreamerError = LogStreamError::WatchSetup {
            path: "/var/log".to_owned(),
            reason: "no inotify instances left".to_owned(),
        }
        .into();
        assert!(matches!(err, LogstreamerError::Pipeline(_)));
    }
}
