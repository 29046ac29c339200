//! 스트리머 설정
//!
//! [`StreamerConfig`]는 core의 [`LogstreamerConfig`](logstreamer_core::config::LogstreamerConfig)를
//! 기반으로 스트리머 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use logstreamer_core::config::LogstreamerConfig;
//! use logstreamer_log_stream::config::StreamerConfig;
//!
//! let core_config = LogstreamerConfig::default();
//! let config = StreamerConfig::from_core(&core_config)?;
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use logstreamer_core::config::{GroupConfig, LogstreamerConfig};

use crate::error::LogStreamError;

/// 메트릭 버스가 가득 찼을 때의 처리 전략
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// 공간이 생길 때까지 생산자를 대기시킴 (기본값, 유실 없음)
    #[default]
    Block,
    /// 가장 오래된 엔트리를 버리고 새 엔트리를 넣음
    DropOldest,
    /// 새 엔트리를 거부함
    DropNewest,
}

impl Backpressure {
    /// 설정 파일에서 쓰는 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::DropOldest => "drop_oldest",
            Self::DropNewest => "drop_newest",
        }
    }
}

impl FromStr for Backpressure {
    type Err = LogStreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Self::Block),
            "drop_oldest" => Ok(Self::DropOldest),
            "drop_newest" => Ok(Self::DropNewest),
            other => Err(LogStreamError::Config {
                field: "backpressure".to_owned(),
                reason: format!("unknown strategy '{other}'"),
            }),
        }
    }
}

/// tailer 하나가 사용하는 읽기 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailSettings {
    /// 새 데이터가 없을 때 다시 확인하기까지의 대기 시간
    pub poll_interval: Duration,
    /// 파일이 사라진 상태로 이 시간이 지나면 tailer 종료
    pub removal_grace: Duration,
    /// 최대 라인 길이 (바이트, 개행 제외)
    pub max_line_length: usize,
}

/// 스트리머 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamerConfig {
    /// 재귀적으로 스캔할 루트 디렉토리
    pub dirs: Vec<PathBuf>,
    /// 그룹 정의 (선언 순서 유지)
    pub groups: Vec<GroupConfig>,
    /// 시작 후 생성되는 파일 감시 여부
    pub watch_new_files: bool,
    /// 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 파일 삭제 후 tailer 종료까지의 유예 시간 (밀리초)
    pub removal_grace_ms: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 메트릭 버스 용량
    pub bus_capacity: usize,
    /// 버스 오버플로우 전략
    pub backpressure: Backpressure,
    /// drain 윈도우 (밀리초)
    pub drain_window_ms: u64,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            groups: Vec::new(),
            watch_new_files: true,
            poll_interval_ms: 250,
            removal_grace_ms: 5_000,
            max_line_length: 64 * 1024, // 64KB
            bus_capacity: 100,
            backpressure: Backpressure::Block,
            drain_window_ms: 1_000,
        }
    }
}

impl StreamerConfig {
    /// core의 `LogstreamerConfig`에서 스트리머 설정을 생성합니다.
    pub fn from_core(core: &LogstreamerConfig) -> Result<Self, LogStreamError> {
        let section = &core.streamer;
        Ok(Self {
            dirs: section.dirs.iter().map(PathBuf::from).collect(),
            groups: core.group.clone(),
            watch_new_files: section.watch_new_files,
            poll_interval_ms: section.poll_interval_ms,
            removal_grace_ms: section.removal_grace_ms,
            max_line_length: section.max_line_length,
            bus_capacity: section.bus_capacity,
            backpressure: section.backpressure.parse()?,
            drain_window_ms: section.drain_window_ms,
        })
    }

    /// tailer 읽기 설정을 반환합니다.
    pub fn tail_settings(&self) -> TailSettings {
        TailSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            removal_grace: Duration::from_millis(self.removal_grace_ms),
            max_line_length: self.max_line_length,
        }
    }

    /// drain 윈도우를 반환합니다.
    pub fn drain_window(&self) -> Duration {
        Duration::from_millis(self.drain_window_ms)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogStreamError> {
        const MAX_BUS_CAPACITY: usize = 1_000_000;
        const MAX_POLL_INTERVAL_MS: u64 = 60_000;
        const MAX_DRAIN_WINDOW_MS: u64 = 3_600_000; // 1 hour
        const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

        if self.bus_capacity == 0 || self.bus_capacity > MAX_BUS_CAPACITY {
            return Err(LogStreamError::Config {
                field: "bus_capacity".to_owned(),
                reason: format!("must be 1-{}", MAX_BUS_CAPACITY),
            });
        }

        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(LogStreamError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: format!("must be 1-{}", MAX_POLL_INTERVAL_MS),
            });
        }

        if self.drain_window_ms == 0 || self.drain_window_ms > MAX_DRAIN_WINDOW_MS {
            return Err(LogStreamError::Config {
                field: "drain_window_ms".to_owned(),
                reason: format!("must be 1-{}", MAX_DRAIN_WINDOW_MS),
            });
        }

        if self.max_line_length == 0 || self.max_line_length > MAX_LINE_LENGTH {
            return Err(LogStreamError::Config {
                field: "max_line_length".to_owned(),
                reason: format!("must be 1-{}", MAX_LINE_LENGTH),
            });
        }

        if self.dirs.iter().any(|d| d.as_os_str().is_empty()) {
            return Err(LogStreamError::Config {
                field: "dirs".to_owned(),
                reason: "directory must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}

/// 스트리머 설정 빌더
#[derive(Default)]
pub struct StreamerConfigBuilder {
    config: StreamerConfig,
}

impl StreamerConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스캔할 루트 디렉토리를 추가합니다.
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.dirs.push(dir.into());
        self
    }

    /// 그룹 정의를 추가합니다.
    pub fn group(mut self, group: GroupConfig) -> Self {
        self.config.groups.push(group);
        self
    }

    /// 새 파일 감시 여부를 설정합니다.
    pub fn watch_new_files(mut self, enabled: bool) -> Self {
        self.config.watch_new_files = enabled;
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 파일 삭제 유예 시간(밀리초)을 설정합니다.
    pub fn removal_grace_ms(mut self, ms: u64) -> Self {
        self.config.removal_grace_ms = ms;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.config.max_line_length = len;
        self
    }

    /// 버스 용량을 설정합니다.
    pub fn bus_capacity(mut self, capacity: usize) -> Self {
        self.config.bus_capacity = capacity;
        self
    }

    /// 버스 오버플로우 전략을 설정합니다.
    pub fn backpressure(mut self, strategy: Backpressure) -> Self {
        self.config.backpressure = strategy;
        self
    }

    /// drain 윈도우(밀리초)를 설정합니다.
    pub fn drain_window_ms(mut self, ms: u64) -> Self {
        self.config.drain_window_ms = ms;
        self
    }

    /// 설정을 검증하고 `StreamerConfig`를 생성합니다.
    pub fn build(self) -> Result<StreamerConfig, LogStreamError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
