//! 통합 테스트 -- 탐색부터 drain/report까지 스트리머 전체 흐름 검증

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use logstreamer_core::config::GroupConfig;
use logstreamer_core::pipeline::Pipeline;
use logstreamer_log_stream::{
    Backpressure, FieldValue, LogStreamer, LogStreamerBuilder, Metric, MetricBus,
    StreamerConfigBuilder, report_batch,
};

const NGINX_RULE: &str =
    r#"\s\[(?P<date>\d{1,2}/\w*/\d+:\d+:\d+:\d+ [+-]?\d+)\]\s.*?"\s(?P<code>\d{3})\s(?P<size_value>\d+)"#;
const NGINX_DATE_FORMAT: &str = "02/Jan/2006:15:04:05 -0700";

fn nginx_line(code: u16, size: u32) -> String {
    format!(
        "127.0.0.1 - - [10/Oct/2020:13:55:36 -0700] \"GET / HTTP/1.1\" {code} {size} \"-\" \"curl/7.68.0\"\n"
    )
}

fn group(name: &str, mask: &str, date_format: Option<&str>) -> GroupConfig {
    GroupConfig {
        mask: mask.to_owned(),
        rules: vec![NGINX_RULE.to_owned()],
        name: Some(name.to_owned()),
        date_format: date_format.map(str::to_owned),
    }
}

fn append(path: &Path, data: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(data.as_bytes()).unwrap();
}

fn build(dir: &Path, groups: Vec<GroupConfig>, watch: bool) -> (LogStreamer, Arc<MetricBus>) {
    let mut builder = StreamerConfigBuilder::new()
        .dir(dir)
        .watch_new_files(watch)
        .poll_interval_ms(10)
        .drain_window_ms(50);
    for group in groups {
        builder = builder.group(group);
    }
    LogStreamerBuilder::new()
        .config(builder.build().unwrap())
        .build()
        .unwrap()
}

/// `want`개가 모일 때까지 (최대 5초) drain합니다.
async fn collect(bus: &MetricBus, want: usize) -> Vec<Metric> {
    let mut out = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while out.len() < want && tokio::time::Instant::now() < deadline {
        out.extend(bus.drain(Duration::from_millis(50)).await);
    }
    out
}

#[tokio::test]
async fn without_date_format_only_new_lines_are_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    fs::write(&path, nginx_line(200, 1).repeat(5)).unwrap();

    let (mut streamer, bus) = build(dir.path(), vec![group("nginx", r"\.log$", None)], false);
    streamer.start().await.unwrap();

    // 기존 라인은 무시됨
    assert!(bus.drain(Duration::from_millis(200)).await.is_empty());

    append(&path, &nginx_line(404, 77));
    let metrics = collect(&bus, 1).await;
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].fields()["code"], "404");
    assert_eq!(metrics[0].group().name(), "nginx");

    // 잠시 더 기다려도 추가 메트릭 없음
    assert!(bus.drain(Duration::from_millis(100)).await.is_empty());
    streamer.stop().await.unwrap();
}

#[tokio::test]
async fn with_date_format_history_is_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    fs::write(&path, nginx_line(200, 10).repeat(7)).unwrap();

    let (mut streamer, bus) = build(
        dir.path(),
        vec![group("nginx", r"\.log$", Some(NGINX_DATE_FORMAT))],
        false,
    );
    streamer.start().await.unwrap();

    let metrics = collect(&bus, 7).await;
    assert_eq!(metrics.len(), 7);
    for metric in &metrics {
        assert!(!metric.fields().contains_key("date"));
        assert_eq!(metric.timestamp().to_rfc3339(), "2020-10-10T20:55:36+00:00");
    }
    streamer.stop().await.unwrap();
}

#[tokio::test]
async fn tailers_on_distinct_files_progress_independently() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.log");
    let b = dir.path().join("b.log");
    fs::write(&a, "").unwrap();
    fs::write(&b, "").unwrap();

    let (mut streamer, bus) = build(dir.path(), vec![group("nginx", r"\.log$", None)], false);
    streamer.start().await.unwrap();
    assert_eq!(streamer.active_tailers(), 2);

    append(&a, &nginx_line(200, 1).repeat(3));
    append(&b, &nginx_line(500, 2));

    let metrics = collect(&bus, 4).await;
    assert_eq!(metrics.len(), 4);
    let from_a: Vec<_> = metrics.iter().filter(|m| m.source() == a.as_path()).collect();
    let from_b: Vec<_> = metrics.iter().filter(|m| m.source() == b.as_path()).collect();
    assert_eq!(from_a.len(), 3);
    assert_eq!(from_b.len(), 1);
    assert_eq!(from_b[0].fields()["code"], "500");

    streamer.stop().await.unwrap();
}

#[tokio::test]
async fn file_matching_two_groups_has_independent_bindings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    fs::write(&path, nginx_line(200, 1).repeat(2)).unwrap();

    let (mut streamer, bus) = build(
        dir.path(),
        vec![
            group("live", r"^access", None),
            group("history", r"\.log$", Some(NGINX_DATE_FORMAT)),
        ],
        false,
    );
    streamer.start().await.unwrap();
    assert_eq!(streamer.active_tailers(), 2);

    let replayed = collect(&bus, 2).await;
    assert_eq!(replayed.len(), 2);
    assert!(replayed.iter().all(|m| m.group().name() == "history"));

    append(&path, &nginx_line(201, 3));
    let fresh = collect(&bus, 2).await;
    assert_eq!(fresh.len(), 2);
    let mut names: Vec<_> = fresh.iter().map(|m| m.group().name().to_owned()).collect();
    names.sort();
    assert_eq!(names, vec!["history", "live"]);

    streamer.stop().await.unwrap();
}

#[tokio::test]
async fn unmatched_lines_produce_no_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    fs::write(&path, "").unwrap();

    let (mut streamer, bus) = build(dir.path(), vec![group("nginx", r"\.log$", None)], false);
    streamer.start().await.unwrap();

    append(&path, "this is not an access log line\n");
    append(&path, &nginx_line(200, 5));
    let metrics = collect(&bus, 1).await;
    assert_eq!(metrics.len(), 1);
    assert!(bus.drain(Duration::from_millis(100)).await.is_empty());

    streamer.stop().await.unwrap();
}

#[tokio::test]
async fn watcher_picks_up_new_files() {
    let dir = tempfile::tempdir().unwrap();
    let (mut streamer, bus) = build(
        dir.path(),
        vec![group("nginx", r"\.log$", Some(NGINX_DATE_FORMAT))],
        true,
    );
    streamer.start().await.unwrap();
    assert_eq!(streamer.active_tailers(), 0);

    fs::write(dir.path().join("late.log"), nginx_line(302, 9)).unwrap();
    let metrics = collect(&bus, 1).await;
    assert_eq!(metrics.len(), 1);
    assert!(metrics[0].source().ends_with("late.log"));

    streamer.stop().await.unwrap();
}

#[tokio::test]
async fn stop_unblocks_producers_on_full_bus() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    fs::write(&path, nginx_line(200, 1).repeat(50)).unwrap();

    let config = StreamerConfigBuilder::new()
        .dir(dir.path())
        .watch_new_files(false)
        .poll_interval_ms(10)
        .bus_capacity(2)
        .backpressure(Backpressure::Block)
        .group(group("nginx", r"\.log$", Some(NGINX_DATE_FORMAT)))
        .build()
        .unwrap();
    let (mut streamer, bus) = LogStreamerBuilder::new().config(config).build().unwrap();
    streamer.start().await.unwrap();

    // 아무도 drain하지 않으므로 tailer는 가득 찬 버스에서 대기
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(bus.len(), 2);
    assert_eq!(bus.dropped_count(), 0);

    tokio::time::timeout(Duration::from_secs(5), streamer.stop())
        .await
        .expect("stop must not hang")
        .unwrap();

    // 닫힌 뒤에도 남은 엔트리는 꺼낼 수 있음
    assert_eq!(bus.try_drain().len(), 2);
}

#[tokio::test]
async fn drop_newest_never_blocks_tailer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    fs::write(&path, nginx_line(200, 1).repeat(20)).unwrap();

    let config = StreamerConfigBuilder::new()
        .dir(dir.path())
        .watch_new_files(false)
        .poll_interval_ms(10)
        .bus_capacity(5)
        .backpressure(Backpressure::DropNewest)
        .group(group("nginx", r"\.log$", Some(NGINX_DATE_FORMAT)))
        .build()
        .unwrap();
    let (mut streamer, bus) = LogStreamerBuilder::new().config(config).build().unwrap();
    streamer.start().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while bus.dropped_count() < 15 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(bus.dropped_count(), 15);
    assert_eq!(bus.try_drain().len(), 5);

    streamer.stop().await.unwrap();
}

#[tokio::test]
async fn drained_metrics_report_typed_points() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    fs::write(&path, nginx_line(200, 2326)).unwrap();

    let (mut streamer, bus) = build(
        dir.path(),
        vec![group("nginx", r"\.log$", Some(NGINX_DATE_FORMAT))],
        false,
    );
    streamer.start().await.unwrap();

    let metrics = collect(&bus, 1).await;
    let (points, result) = report_batch(&metrics).into_result();
    result.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].measurement, "nginx");
    assert_eq!(points[0].fields["size"], FieldValue::Integer(2326));
    assert_eq!(points[0].tags["code"], "200");
    assert_eq!(points[0].tags["group"], "nginx");

    streamer.stop().await.unwrap();
}
