//! logstreamer 로그 스트림 크레이트
//!
//! 설정된 디렉토리의 로그 파일을 찾아 따라가며, 그룹별 정규식 규칙으로
//! 각 라인에서 필드를 추출해 메트릭으로 발행합니다.
//!
//! # 모듈 구성
//!
//! - [`rule`]: 규칙, 그룹, 날짜 형식, 라인 평가
//! - [`collector`]: 파일 탐색/배정, tailer, 디렉토리 감시
//! - [`bus`]: tailer와 소비자 사이의 유한 메트릭 버스
//! - [`metric`]: 규칙 매칭 결과 레코드
//! - [`report`]: 접미어 규칙에 따른 타입 있는 포인트 변환
//! - [`streamer`]: 전체 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 스트리머 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! discover/assign -> Tailer -> rule::evaluate -> MetricBus -> drain -> report
//!        ^
//!   DirWatcher (새 파일)
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod metric;
pub mod report;
pub mod streamer;

pub mod collector;
pub mod rule;

// --- 주요 타입 re-export ---

// 스트리머
pub use streamer::{LogStreamer, LogStreamerBuilder};

// 설정
pub use config::{Backpressure, StreamerConfig, StreamerConfigBuilder, TailSettings};

// 에러
pub use error::{FieldCoercionError, LogStreamError};

// 규칙
pub use rule::{DateLayout, Fields, Group, Rule};

// 수집기
pub use collector::{TailBinding, assign, discover};

// 버스와 메트릭
pub use bus::{MetricBus, PushOutcome};
pub use metric::Metric;

// 리포터
pub use report::{BatchReport, FieldValue, Point, report, report_batch};
