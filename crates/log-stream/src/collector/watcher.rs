//! 디렉토리 감시 -- 시작 후 새로 생긴 파일을 배정하고 tailer 시작
//!
//! 루트 디렉토리 하나당 [`DirWatcher`] 하나가 `notify`의 OS 네이티브 감시
//! (Linux: inotify)를 비재귀 모드로 사용합니다.
//! notify 콜백 스레드의 이벤트는 unbounded 채널로 tokio 태스크에 전달됩니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::counter;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logstreamer_core::metrics as m;

use super::TailerSpawner;
use super::discovery::{absolute, assign};
use crate::error::LogStreamError;
use crate::rule::Group;

/// 루트 디렉토리 하나의 감시자
pub struct DirWatcher {
    dir: PathBuf,
    /// drop되면 감시가 해제되므로 태스크가 끝날 때까지 보관
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    groups: Vec<Arc<Group>>,
    spawner: TailerSpawner,
    cancel: CancellationToken,
}

impl DirWatcher {
    /// 디렉토리 감시를 설정합니다.
    ///
    /// 감시를 걸 수 없으면 `WatchSetup` 에러를 반환합니다.
    pub fn new(
        dir: &Path,
        groups: Vec<Arc<Group>>,
        spawner: TailerSpawner,
        cancel: CancellationToken,
    ) -> Result<Self, LogStreamError> {
        let setup_err = |e: notify::Error| LogStreamError::WatchSetup {
            path: dir.display().to_string(),
            reason: e.to_string(),
        };

        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(setup_err)?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(setup_err)?;

        debug!(dir = %dir.display(), "watching directory for new files");

        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
            events,
            groups,
            spawner,
            cancel,
        })
    }

    /// 감시 중인 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 취소될 때까지 이벤트를 처리합니다.
    pub async fn run(self) {
        let Self {
            dir,
            _watcher: watcher,
            mut events,
            groups,
            spawner,
            cancel,
        } = self;
        let handler = NewFileHandler { groups, spawner };

        info!(dir = %dir.display(), "directory watcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(Ok(event)) => handler.handle(event).await,
                    Some(Err(e)) => {
                        counter!(m::WATCHER_ERRORS_TOTAL).increment(1);
                        let err = LogStreamError::WatchRuntime(e.to_string());
                        warn!(dir = %dir.display(), error = %err, "watch notification failed");
                    }
                    None => {
                        warn!(dir = %dir.display(), "watch channel closed");
                        break;
                    }
                },
            }
        }

        drop(watcher);
        info!(dir = %dir.display(), "directory watcher stopped");
    }
}

/// 새 파일 이벤트를 배정과 tailer 시작으로 연결
struct NewFileHandler {
    groups: Vec<Arc<Group>>,
    spawner: TailerSpawner,
}

impl NewFileHandler {
    async fn handle(&self, event: Event) {
        // mv로 들어온 파일도 새 파일로 취급
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))
        ) {
            return;
        }

        for path in &event.paths {
            self.on_created(path).await;
        }
    }

    async fn on_created(&self, path: &Path) {
        let path = match absolute(path) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "can't resolve created file");
                return;
            }
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return,
        }

        counter!(m::WATCHER_FILES_DISCOVERED_TOTAL).increment(1);
        debug!(path = %path.display(), "assigning new file");

        match assign(std::slice::from_ref(&path), &self.groups).await {
            Ok(bindings) => {
                for binding in bindings {
                    self.spawner.spawn(binding);
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "can't assign new file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MetricBus;
    use crate::config::{Backpressure, StreamerConfig};
    use logstreamer_core::config::GroupConfig;
    use std::time::Duration;
    use tokio_util::task::TaskTracker;

    fn groups() -> Vec<Arc<Group>> {
        let config = GroupConfig {
            mask: r"\.log$".to_owned(),
            rules: vec![r"code=(?P<code>\d+)".to_owned()],
            name: Some("app".to_owned()),
            date_format: Some("2006-01-02".to_owned()),
        };
        vec![Arc::new(Group::compile(0, &config).unwrap())]
    }

    fn spawner(bus: &Arc<MetricBus>, cancel: &CancellationToken) -> TailerSpawner {
        let (done_tx, _done_rx) = mpsc::unbounded_channel();
        let settings = StreamerConfig {
            poll_interval_ms: 10,
            ..Default::default()
        }
        .tail_settings();
        TailerSpawner::new(
            Arc::clone(bus),
            settings,
            cancel.clone(),
            TaskTracker::new(),
            done_tx,
        )
    }

    #[test]
    fn missing_directory_is_watch_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(MetricBus::new(10, Backpressure::Block));
        let cancel = CancellationToken::new();
        let result = DirWatcher::new(
            &dir.path().join("missing"),
            groups(),
            spawner(&bus, &cancel),
            cancel,
        );
        assert!(matches!(result, Err(LogStreamError::WatchSetup { .. })));
    }

    #[tokio::test]
    async fn new_file_is_assigned_and_tailed() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(MetricBus::new(10, Backpressure::Block));
        let cancel = CancellationToken::new();
        let spawner = spawner(&bus, &cancel);
        let watcher =
            DirWatcher::new(dir.path(), groups(), spawner.clone(), cancel.clone()).unwrap();
        let handle = tokio::spawn(watcher.run());

        std::fs::write(dir.path().join("ignored.txt"), "code=1\n").unwrap();
        std::fs::write(dir.path().join("new.log"), "code=200\n").unwrap();

        let mut metrics = Vec::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while metrics.is_empty() && tokio::time::Instant::now() < deadline {
            metrics.extend(bus.drain(Duration::from_millis(50)).await);
        }
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].fields()["code"], "200");
        assert!(metrics[0].source().ends_with("new.log"));
        assert_eq!(spawner.active_count(), 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
