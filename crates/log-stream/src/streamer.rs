//! 스트리머 오케스트레이션 -- 탐색/배정/tail/감시 태스크 전체를 관리합니다.
//!
//! [`LogStreamer`]는 core의 [`Pipeline`](logstreamer_core::pipeline::Pipeline) trait을 구현하여
//! `logstreamer-daemon`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! discover -> assign -> Tailer (파일, 그룹)마다 1개 ─┐
//! DirWatcher (루트 디렉토리마다 1개) -> assign ──────┴─> MetricBus -> drain (소비자)
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use logstreamer_core::error::{LogstreamerError, PipelineError};
use logstreamer_core::pipeline::{HealthStatus, Pipeline};

use crate::bus::MetricBus;
use crate::collector::{DirWatcher, TailerSpawner, assign, discover};
use crate::config::StreamerConfig;
use crate::error::LogStreamError;
use crate::rule::Group;

/// 스트리머 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamerState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨 (재시작 불가)
    Stopped,
}

/// 로그 스트리머
///
/// # 사용 예시
/// ```ignore
/// use logstreamer_log_stream::{LogStreamerBuilder, StreamerConfig};
///
/// let (mut streamer, bus) = LogStreamerBuilder::new()
///     .config(config)
///     .build()?;
///
/// streamer.start().await?;
/// let metrics = bus.drain(Duration::from_secs(1)).await;
/// ```
pub struct LogStreamer {
    config: StreamerConfig,
    groups: Vec<Arc<Group>>,
    bus: Arc<MetricBus>,
    state: StreamerState,
    cancel: CancellationToken,
    tracker: TaskTracker,
    /// 실행 중에만 존재. 완료 채널 송신측을 들고 있으므로 join 전에 내려놓음
    spawner: Option<TailerSpawner>,
}

impl LogStreamer {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            StreamerState::Initialized => "initialized",
            StreamerState::Running => "running",
            StreamerState::Stopped => "stopped",
        }
    }

    /// 컴파일된 그룹 목록
    pub fn groups(&self) -> &[Arc<Group>] {
        &self.groups
    }

    /// 메트릭 버스
    pub fn bus(&self) -> &Arc<MetricBus> {
        &self.bus
    }

    /// 모든 태스크가 관찰하는 취소 토큰
    ///
    /// 신호 핸들러 등 외부에서 종료를 요청할 때 사용합니다.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 실행 중인 tailer 수
    pub fn active_tailers(&self) -> usize {
        self.spawner.as_ref().map_or(0, TailerSpawner::active_count)
    }

    /// 모든 tailer와 watcher 태스크가 끝날 때까지 기다립니다.
    ///
    /// watcher가 켜져 있으면 취소되기 전까지 반환하지 않습니다.
    pub async fn join(&mut self) {
        self.spawner = None;
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn log_completions(mut done_rx: mpsc::UnboundedReceiver<std::path::PathBuf>) {
    while let Some(path) = done_rx.recv().await {
        debug!(path = %path.display(), "finished reading");
    }
}

impl Pipeline for LogStreamer {
    async fn start(&mut self) -> Result<(), LogstreamerError> {
        match self.state {
            StreamerState::Initialized => {}
            StreamerState::Running => return Err(PipelineError::AlreadyRunning.into()),
            StreamerState::Stopped => {
                return Err(PipelineError::InitFailed(
                    "streamer cannot be restarted after stop".to_owned(),
                )
                .into());
            }
        }

        info!(
            dirs = ?self.config.dirs,
            groups = self.groups.len(),
            "starting log streamer"
        );

        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let spawner = TailerSpawner::new(
            Arc::clone(&self.bus),
            self.config.tail_settings(),
            self.cancel.clone(),
            self.tracker.clone(),
            done_tx,
        );

        // 탐색 전에 감시를 걸어 그 사이에 생긴 파일도 놓치지 않음
        let watchers = if self.config.watch_new_files {
            self.config
                .dirs
                .iter()
                .map(|dir| {
                    DirWatcher::new(
                        dir,
                        self.groups.clone(),
                        spawner.clone(),
                        self.cancel.clone(),
                    )
                })
                .collect::<Result<Vec<_>, LogStreamError>>()?
        } else {
            Vec::new()
        };

        let files = discover(&self.config.dirs)?;
        let bindings = assign(&files, &self.groups).await?;
        info!(
            files = files.len(),
            bindings = bindings.len(),
            "initial files assigned"
        );

        for binding in bindings {
            spawner.spawn(binding);
        }
        for watcher in watchers {
            self.tracker.spawn(watcher.run());
        }
        self.tracker.spawn(log_completions(done_rx));

        self.spawner = Some(spawner);
        self.state = StreamerState::Running;
        info!("log streamer started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogstreamerError> {
        if self.state != StreamerState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping log streamer");

        self.cancel.cancel();
        self.bus.close();
        self.join().await;

        let remaining = self.bus.len();
        if remaining > 0 {
            info!(count = remaining, "metrics left on bus for final drain");
        }

        self.state = StreamerState::Stopped;
        info!("log streamer stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            StreamerState::Running => {
                if self.bus.is_closed() {
                    return HealthStatus::Unhealthy("metric bus closed".to_owned());
                }
                let utilization = self.bus.utilization();
                if utilization > 0.9 {
                    HealthStatus::Degraded(format!(
                        "bus utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            StreamerState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            StreamerState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 스트리머 빌더
///
/// 그룹을 컴파일하고 메트릭 버스를 생성합니다.
#[derive(Default)]
pub struct LogStreamerBuilder {
    config: StreamerConfig,
}

impl LogStreamerBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스트리머 설정을 지정합니다.
    pub fn config(mut self, config: StreamerConfig) -> Self {
        self.config = config;
        self
    }

    /// 스트리머를 빌드합니다.
    ///
    /// # Returns
    /// - `LogStreamer`: 스트리머 인스턴스
    /// - `Arc<MetricBus>`: 소비자가 drain할 버스 핸들
    pub fn build(self) -> Result<(LogStreamer, Arc<MetricBus>), LogStreamError> {
        self.config.validate()?;
        let groups = Group::compile_all(&self.config.groups)?;
        let bus = Arc::new(MetricBus::new(
            self.config.bus_capacity,
            self.config.backpressure,
        ));

        let streamer = LogStreamer {
            config: self.config,
            groups,
            bus: Arc::clone(&bus),
            state: StreamerState::Initialized,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            spawner: None,
        };

        Ok((streamer, bus))
    }
}
