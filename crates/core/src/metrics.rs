//! 메트릭 상수 및 설명 등록
//!
//! 스트리머 내부 관측용 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 규칙에 매칭되지 않거나 날짜 파싱에 실패한 라인은 메트릭을 만들지 않으므로,
//! 이 카운터들이 유실을 드러내는 유일한 통로입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logstreamer_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(logstreamer_core::metrics::LINES_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 그룹 이름 레이블 키
pub const LABEL_GROUP: &str = "group";

/// 백프레셔 전략 레이블 키 (drop_oldest, drop_newest)
pub const LABEL_STRATEGY: &str = "strategy";

// ─── Tailer 메트릭 ────────────────────────────────────────────────

/// 읽은 전체 라인 수 (counter, label: group)
pub const LINES_READ_TOTAL: &str = "logstreamer_lines_read_total";

/// 어떤 규칙에도 매칭되지 않은 라인 수 (counter, label: group)
pub const LINES_UNMATCHED_TOTAL: &str = "logstreamer_lines_unmatched_total";

/// 최대 길이를 넘어 버린 라인 수 (counter, label: group)
pub const LINES_OVERSIZE_TOTAL: &str = "logstreamer_lines_oversize_total";

/// 규칙 매칭 수 (counter, label: group)
pub const RULE_MATCHES_TOTAL: &str = "logstreamer_rule_matches_total";

/// 날짜 파싱 실패로 버린 메트릭 수 (counter, label: group)
pub const DATE_PARSE_ERRORS_TOTAL: &str = "logstreamer_date_parse_errors_total";

/// 실행 중인 tailer 수 (gauge)
pub const ACTIVE_TAILERS: &str = "logstreamer_active_tailers";

/// 파일 로테이션/truncation 감지 횟수 (counter)
pub const FILE_REOPENS_TOTAL: &str = "logstreamer_file_reopens_total";

// ─── MetricBus 메트릭 ────────────────────────────────────────────────

/// 버스에 들어간 메트릭 수 (counter)
pub const BUS_PUSHED_TOTAL: &str = "logstreamer_bus_pushed_total";

/// 백프레셔 전략에 의해 버려진 메트릭 수 (counter, label: strategy)
pub const BUS_DROPPED_TOTAL: &str = "logstreamer_bus_dropped_total";

/// drain으로 꺼낸 메트릭 수 (counter)
pub const BUS_DRAINED_TOTAL: &str = "logstreamer_bus_drained_total";

// ─── Watcher / Reporter 메트릭 ───────────────────────────────────────

/// 감시 중 새로 발견한 파일 수 (counter)
pub const WATCHER_FILES_DISCOVERED_TOTAL: &str = "logstreamer_watcher_files_discovered_total";

/// 감시 알림 전달 에러 수 (counter)
pub const WATCHER_ERRORS_TOTAL: &str = "logstreamer_watcher_errors_total";

/// 필드 타입 변환 실패 수 (counter)
pub const REPORT_COERCION_ERRORS_TOTAL: &str = "logstreamer_report_coercion_errors_total";

// ─── Daemon 메트릭 ────────────────────────────────────────────────

/// 출력 싱크에 기록한 포인트 수 (counter)
pub const POINTS_WRITTEN_TOTAL: &str = "logstreamer_points_written_total";

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 레코더가 설치되지 않은 상태에서도 호출해도 안전합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(LINES_READ_TOTAL, "Total number of lines read by all tailers");
    describe_counter!(
        LINES_UNMATCHED_TOTAL,
        "Lines that matched no rule of their group"
    );
    describe_counter!(
        LINES_OVERSIZE_TOTAL,
        "Lines dropped because they exceeded the maximum line length"
    );
    describe_counter!(RULE_MATCHES_TOTAL, "Total number of rule matches");
    describe_counter!(
        DATE_PARSE_ERRORS_TOTAL,
        "Metrics dropped because the date field could not be parsed"
    );
    describe_gauge!(ACTIVE_TAILERS, "Number of running tailer tasks");
    describe_counter!(
        FILE_REOPENS_TOTAL,
        "Number of truncations or rotations handled by tailers"
    );

    describe_counter!(BUS_PUSHED_TOTAL, "Metrics accepted by the metric bus");
    describe_counter!(
        BUS_DROPPED_TOTAL,
        "Metrics discarded by the bus overflow strategy"
    );
    describe_counter!(BUS_DRAINED_TOTAL, "Metrics handed to the consumer");

    describe_counter!(
        WATCHER_FILES_DISCOVERED_TOTAL,
        "Files discovered after startup by directory watchers"
    );
    describe_counter!(
        WATCHER_ERRORS_TOTAL,
        "Notification delivery errors reported by directory watchers"
    );
    describe_counter!(
        REPORT_COERCION_ERRORS_TOTAL,
        "Suffix-typed fields that could not be coerced to a number"
    );

    describe_counter!(POINTS_WRITTEN_TOTAL, "Points written to the output sink");
}
