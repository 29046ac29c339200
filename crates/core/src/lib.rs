//! logstreamer 공통 크레이트
//!
//! 로그 파일에서 메트릭을 추출하는 `logstreamer` 워크스페이스의 공통 기반입니다.
//!
//! - [`error`]: 최상위 에러 타입 ([`LogstreamerError`])
//! - [`config`]: `logstreamer.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`metrics`]: 내부 관측용 메트릭 이름 상수
//! - [`pipeline`]: 모듈 생명주기 trait ([`Pipeline`], [`HealthStatus`])

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogstreamerError, PipelineError};

// 설정
pub use config::{GeneralConfig, GroupConfig, LogstreamerConfig, StreamerSection};

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};
