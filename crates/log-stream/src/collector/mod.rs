//! 파일 수집 모듈 -- 탐색, 그룹 배정, tail, 디렉토리 감시
//!
//! # 구성
//! - [`discovery`]: 루트 디렉토리를 재귀 탐색하고 파일을 그룹에 배정
//! - [`tailer`]: (파일, 그룹) 바인딩 하나를 따라가며 메트릭을 버스로 전달
//! - [`watcher`]: 루트 디렉토리에 새로 생긴 파일을 배정하고 tailer 시작
//!
//! # 아키텍처
//! 각 tailer와 watcher는 자체 tokio 태스크에서 실행되며, 모두 같은
//! [`TaskTracker`]와 [`CancellationToken`]을 공유합니다.
//! tailer가 끝나면 파일 경로를 완료 채널로 보냅니다.

pub mod discovery;
pub mod tailer;
pub mod watcher;

pub use discovery::{assign, discover};
pub use tailer::{TailExit, Tailer};
pub use watcher::DirWatcher;

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::fs::File;
use tokio::io::AsyncSeekExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::bus::MetricBus;
use crate::config::TailSettings;
use crate::error::LogStreamError;
use crate::rule::{Group, StartPosition};

/// 파일 식별자 (Unix: device + inode)
pub(crate) type FileId = (u64, u64);

#[cfg(unix)]
pub(crate) fn file_id(meta: &std::fs::Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
pub(crate) fn file_id(_meta: &std::fs::Metadata) -> Option<FileId> {
    None
}

/// 그룹 하나를 위해 따라가는 파일 하나
///
/// 파일은 열린 상태로 시작 위치까지 이동해 있습니다.
#[derive(Debug)]
pub struct TailBinding {
    path: Arc<Path>,
    group: Arc<Group>,
    file: File,
    offset: u64,
    identity: Option<FileId>,
}

impl TailBinding {
    /// 파일을 열고 그룹의 시작 정책에 따라 위치를 잡습니다.
    ///
    /// 날짜 형식이 있는 그룹은 처음부터, 없는 그룹은 지금의 파일 끝부터 읽습니다.
    pub async fn open(path: &Path, group: &Arc<Group>) -> Result<Self, LogStreamError> {
        let open_err = |e: std::io::Error| LogStreamError::Open {
            path: path.display().to_string(),
            group: group.name().to_owned(),
            reason: e.to_string(),
        };

        let mut file = File::open(path).await.map_err(open_err)?;
        let meta = file.metadata().await.map_err(open_err)?;

        let offset = match group.start_position() {
            StartPosition::Beginning => 0,
            StartPosition::End => meta.len(),
        };
        file.seek(SeekFrom::Start(offset)).await.map_err(open_err)?;

        debug!(
            path = %path.display(),
            group = group.name(),
            offset,
            "opened tail binding"
        );

        Ok(Self {
            path: Arc::from(path),
            group: Arc::clone(group),
            file,
            offset,
            identity: file_id(&meta),
        })
    }

    /// 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 바인딩된 그룹
    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }

    /// 시작 오프셋
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn into_parts(self) -> (Arc<Path>, Arc<Group>, File, u64, Option<FileId>) {
        (self.path, self.group, self.file, self.offset, self.identity)
    }
}

type BindingKey = (PathBuf, usize);

/// tailer 태스크를 시작하는 핸들
///
/// 같은 (경로, 그룹) 바인딩이 이미 실행 중이면 다시 시작하지 않습니다.
/// 복제해서 watcher 태스크에 넘길 수 있습니다.
#[derive(Clone)]
pub struct TailerSpawner {
    bus: Arc<MetricBus>,
    settings: TailSettings,
    cancel: CancellationToken,
    tracker: TaskTracker,
    done_tx: mpsc::UnboundedSender<PathBuf>,
    active: Arc<Mutex<HashSet<BindingKey>>>,
}

impl TailerSpawner {
    /// 새 spawner를 생성합니다.
    pub fn new(
        bus: Arc<MetricBus>,
        settings: TailSettings,
        cancel: CancellationToken,
        tracker: TaskTracker,
        done_tx: mpsc::UnboundedSender<PathBuf>,
    ) -> Self {
        Self {
            bus,
            settings,
            cancel,
            tracker,
            done_tx,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// 바인딩에 대한 tailer 태스크를 시작합니다.
    ///
    /// 이미 같은 바인딩이 실행 중이면 `false`를 반환합니다.
    pub fn spawn(&self, binding: TailBinding) -> bool {
        let key = (binding.path().to_path_buf(), binding.group().index());
        if !lock(&self.active).insert(key.clone()) {
            debug!(
                path = %key.0.display(),
                group = binding.group().name(),
                "binding already tailed, skipping"
            );
            return false;
        }

        info!(
            path = %key.0.display(),
            group = binding.group().name(),
            offset = binding.offset(),
            "start tailing"
        );

        let tailer = Tailer::new(
            binding,
            Arc::clone(&self.bus),
            self.settings,
            self.cancel.clone(),
        );
        let active = Arc::clone(&self.active);
        let done_tx = self.done_tx.clone();

        self.tracker.spawn(async move {
            let exit = tailer.run().await;
            lock(&active).remove(&key);
            debug!(path = %key.0.display(), ?exit, "tailer finished");
            // 스트리머가 이미 정리된 경우 수신자가 없을 수 있음
            let _ = done_tx.send(key.0);
        });
        true
    }

    /// 실행 중인 tailer 수
    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
