//! 파일 tailer -- 바인딩 하나를 따라가며 새 라인을 메트릭으로 변환
//!
//! # 따라가기 규칙
//! - 새 데이터가 없으면 `poll_interval` 동안 대기 후 다시 확인
//! - 파일이 커서보다 짧아지면 (truncation) 처음부터 다시 읽음
//! - 경로가 다른 inode를 가리키면 (로테이션) 이전 파일을 끝까지 읽고 새 파일을 처음부터 읽음
//! - 경로가 `removal_grace` 이상 사라져 있으면 종료
//! - 개행이 없는 마지막 조각은 완성될 때까지 보관, CRLF는 제거
//! - `max_line_length`를 넘는 라인은 버리고 카운트

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logstreamer_core::metrics as m;

use super::{FileId, TailBinding, file_id};
use crate::bus::MetricBus;
use crate::config::TailSettings;
use crate::error::LogStreamError;
use crate::rule::{self, Group};

/// tailer 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailExit {
    /// 취소 토큰에 의해 종료
    Cancelled,
    /// 파일이 유예 시간 이상 사라짐
    Removed,
    /// 메트릭 버스가 닫힘
    BusClosed,
}

/// EOF에서 확인한 경로 상태
#[derive(Debug, PartialEq, Eq)]
enum PathState {
    Unchanged,
    Truncated,
    Rotated,
    Missing,
}

/// 바인딩 하나를 따라가는 tailer
pub struct Tailer {
    path: Arc<Path>,
    group: Arc<Group>,
    reader: BufReader<File>,
    offset: u64,
    identity: Option<FileId>,
    /// 아직 개행을 만나지 못한 라인 조각
    pending: Vec<u8>,
    /// 너무 긴 라인의 나머지를 버리는 중
    discarding: bool,
    bus: Arc<MetricBus>,
    settings: TailSettings,
    cancel: CancellationToken,
}

impl Tailer {
    /// 열린 바인딩으로 tailer를 생성합니다.
    pub fn new(
        binding: TailBinding,
        bus: Arc<MetricBus>,
        settings: TailSettings,
        cancel: CancellationToken,
    ) -> Self {
        let (path, group, file, offset, identity) = binding.into_parts();
        Self {
            path,
            group,
            reader: BufReader::new(file),
            offset,
            identity,
            pending: Vec::new(),
            discarding: false,
            bus,
            settings,
            cancel,
        }
    }

    /// 취소되거나 파일이 사라지거나 버스가 닫힐 때까지 파일을 따라갑니다.
    pub async fn run(mut self) -> TailExit {
        gauge!(m::ACTIVE_TAILERS).increment(1.0);
        let exit = self.follow().await;
        gauge!(m::ACTIVE_TAILERS).decrement(1.0);

        info!(
            path = %self.path.display(),
            group = self.group.name(),
            ?exit,
            "stop tailing"
        );
        exit
    }

    async fn follow(&mut self) -> TailExit {
        let mut missing_since: Option<Instant> = None;

        loop {
            if self.cancel.is_cancelled() {
                return TailExit::Cancelled;
            }

            if let Err(exit) = self.read_available().await {
                return exit;
            }

            match self.path_state().await {
                PathState::Unchanged => missing_since = None,
                PathState::Truncated => {
                    missing_since = None;
                    warn!(
                        path = %self.path.display(),
                        offset = self.offset,
                        "file truncated, reading from start"
                    );
                    counter!(m::FILE_REOPENS_TOTAL).increment(1);
                    if let Err(e) = self.rewind().await {
                        warn!(
                            path = %self.path.display(),
                            error = %e,
                            "failed to rewind truncated file"
                        );
                    }
                    continue;
                }
                PathState::Rotated => {
                    missing_since = None;
                    match self.reopen().await {
                        Ok(()) => {
                            if let Err(exit) = self.flush_pending().await {
                                return exit;
                            }
                            continue;
                        }
                        Err(e) => {
                            debug!(
                                path = %self.path.display(),
                                error = %e,
                                "rotated file not ready yet"
                            );
                        }
                    }
                }
                PathState::Missing => {
                    let since = *missing_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= self.settings.removal_grace {
                        if let Err(exit) = self.flush_pending().await {
                            return exit;
                        }
                        return TailExit::Removed;
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return TailExit::Cancelled,
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }

    /// EOF까지 완성된 라인을 모두 처리합니다.
    async fn read_available(&mut self) -> Result<(), TailExit> {
        loop {
            match self.next_line().await {
                Ok(Some(line)) => self.emit(&line).await?,
                Ok(None) => return Ok(()),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "read error");
                    return Ok(());
                }
            }
        }
    }

    /// 다음 완성된 라인을 읽습니다. EOF에서는 `None`.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let max = self.settings.max_line_length;

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(None);
            }

            let newline = buf.iter().position(|&b| b == b'\n');
            let chunk_end = newline.unwrap_or(buf.len());
            if !self.discarding {
                self.pending.extend_from_slice(&buf[..chunk_end]);
            }
            let consumed = newline.map_or(buf.len(), |i| i + 1);
            self.reader.consume(consumed);
            self.offset += consumed as u64;

            // CR 한 바이트 여유
            if !self.discarding && self.pending.len() > max + 1 {
                self.drop_oversize();
                self.discarding = true;
            }

            if newline.is_none() {
                continue;
            }

            if self.discarding {
                self.discarding = false;
                continue;
            }

            let mut line = std::mem::take(&mut self.pending);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.len() > max {
                self.drop_oversize();
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }
    }

    fn drop_oversize(&mut self) {
        self.pending.clear();
        counter!(m::LINES_OVERSIZE_TOTAL, m::LABEL_GROUP => self.group.name().to_owned())
            .increment(1);
        warn!(
            path = %self.path.display(),
            max_line_length = self.settings.max_line_length,
            "line exceeds max length, dropped"
        );
    }

    /// 라인 하나에 규칙을 적용하고 결과 메트릭을 버스에 넣습니다.
    async fn emit(&mut self, line: &str) -> Result<(), TailExit> {
        counter!(m::LINES_READ_TOTAL, m::LABEL_GROUP => self.group.name().to_owned()).increment(1);

        for metric in rule::evaluate(&self.group, &self.path, line) {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(TailExit::Cancelled),
                pushed = self.bus.push(metric) => {
                    if let Err(LogStreamError::BusClosed) = pushed {
                        return Err(TailExit::BusClosed);
                    }
                }
            }
        }
        Ok(())
    }

    /// 개행 없이 남은 조각을 마지막 라인으로 처리합니다.
    async fn flush_pending(&mut self) -> Result<(), TailExit> {
        if self.discarding {
            self.discarding = false;
            self.pending.clear();
            return Ok(());
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let line = String::from_utf8_lossy(&line).into_owned();
        self.emit(&line).await
    }

    async fn path_state(&self) -> PathState {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(_) => return PathState::Missing,
        };

        match (self.identity, file_id(&meta)) {
            (Some(current), Some(now)) if current != now => return PathState::Rotated,
            _ => {}
        }

        if meta.len() < self.offset {
            PathState::Truncated
        } else {
            PathState::Unchanged
        }
    }

    async fn rewind(&mut self) -> std::io::Result<()> {
        self.reader.seek(SeekFrom::Start(0)).await?;
        self.offset = 0;
        self.pending.clear();
        self.discarding = false;
        Ok(())
    }

    /// 로테이션된 경로를 새로 열고 처음부터 읽습니다.
    ///
    /// 이전 파일의 남은 데이터는 호출 전에 이미 읽혀 있습니다.
    async fn reopen(&mut self) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;
        let meta = file.metadata().await?;

        info!(path = %self.path.display(), "file rotated, reopening");
        counter!(m::FILE_REOPENS_TOTAL).increment(1);

        self.reader = BufReader::new(file);
        self.identity = file_id(&meta);
        self.offset = 0;
        Ok(())
    }
}
