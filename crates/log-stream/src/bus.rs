//! 메트릭 버스 -- tailer와 소비자 사이의 유한 FIFO 큐
//!
//! [`MetricBus`]는 모든 tailer(생산자)가 공유하고, 소비자 하나가
//! [`drain`](MetricBus::drain)으로 시간 윈도우 단위로 꺼내 갑니다.
//!
//! # 오버플로우 정책
//! 버스가 가득 찬 경우:
//! - [`Backpressure::Block`]: 공간이 생길 때까지 생산자 대기 (유실 없음)
//! - [`Backpressure::DropOldest`]: 가장 오래된 엔트리를 드롭
//! - [`Backpressure::DropNewest`]: 새 유입을 거부
//!
//! # 종료
//! [`close`](MetricBus::close) 이후의 push는 `BusClosed`로 실패하고,
//! 대기 중이던 생산자와 drain은 모두 깨어납니다. 이미 들어간 엔트리는
//! 닫힌 뒤에도 drain할 수 있습니다.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use metrics::counter;
use tokio::sync::Notify;
use tokio::time::Instant;

use logstreamer_core::metrics as m;

use crate::config::Backpressure;
use crate::error::LogStreamError;
use crate::metric::Metric;

/// push 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// 큐에 들어감
    Queued,
    /// 큐에 들어갔고, 대신 가장 오래된 엔트리가 버려짐
    DroppedOldest,
    /// 큐가 가득 차서 새 엔트리가 버려짐
    Rejected,
}

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// 유한 용량 메트릭 버스
pub struct MetricBus<T = Metric> {
    state: Mutex<State<T>>,
    capacity: usize,
    backpressure: Backpressure,
    /// 엔트리가 들어왔거나 버스가 닫힘
    not_empty: Notify,
    /// 공간이 생겼거나 버스가 닫힘
    not_full: Notify,
    pushed: AtomicU64,
    dropped: AtomicU64,
    drained: AtomicU64,
}

impl<T> MetricBus<T> {
    /// 새 버스를 생성합니다. 용량 0은 1로 취급합니다.
    pub fn new(capacity: usize, backpressure: Backpressure) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity.min(10_000)),
                closed: false,
            }),
            capacity,
            backpressure,
            not_empty: Notify::new(),
            not_full: Notify::new(),
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            drained: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 엔트리를 추가합니다.
    ///
    /// `Block` 전략에서는 공간이 생길 때까지 대기합니다.
    /// 버스가 닫혀 있거나 대기 중에 닫히면 `BusClosed`를 반환합니다.
    pub async fn push(&self, item: T) -> Result<PushOutcome, LogStreamError> {
        loop {
            let mut notified = pin!(self.not_full.notified());
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(LogStreamError::BusClosed);
                }

                if state.queue.len() < self.capacity {
                    state.queue.push_back(item);
                    drop(state);
                    self.record_push();
                    return Ok(PushOutcome::Queued);
                }

                match self.backpressure {
                    Backpressure::Block => {}
                    Backpressure::DropOldest => {
                        state.queue.pop_front();
                        state.queue.push_back(item);
                        drop(state);
                        self.record_drop();
                        self.record_push();
                        return Ok(PushOutcome::DroppedOldest);
                    }
                    Backpressure::DropNewest => {
                        drop(state);
                        self.record_drop();
                        return Ok(PushOutcome::Rejected);
                    }
                }
            }

            notified.await;
        }
    }

    fn record_push(&self) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
        counter!(m::BUS_PUSHED_TOTAL).increment(1);
        self.not_empty.notify_waiters();
    }

    fn record_drop(&self) {
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        counter!(m::BUS_DROPPED_TOTAL, m::LABEL_STRATEGY => self.backpressure.as_str())
            .increment(1);
        tracing::warn!(
            dropped,
            capacity = self.capacity,
            strategy = self.backpressure.as_str(),
            "metric bus full, dropped entry"
        );
    }

    /// `window` 동안 들어오는 엔트리를 모두 모아 반환합니다.
    ///
    /// 버스가 닫히면 윈도우가 끝나기 전에 남은 엔트리와 함께 반환합니다.
    pub async fn drain(&self, window: Duration) -> Vec<T> {
        let deadline = Instant::now() + window;
        let mut out = Vec::new();

        loop {
            let mut notified = pin!(self.not_empty.notified());
            notified.as_mut().enable();

            let closed = self.take_into(&mut out);
            if closed {
                break;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                self.take_into(&mut out);
                break;
            }
        }

        out
    }

    /// 대기 없이 현재 들어 있는 엔트리를 모두 꺼냅니다.
    pub fn try_drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        self.take_into(&mut out);
        out
    }

    /// 큐를 비워 `out`에 붙이고, 버스가 닫혔는지 여부를 반환합니다.
    fn take_into(&self, out: &mut Vec<T>) -> bool {
        let (taken, closed) = {
            let mut state = self.lock();
            let taken = state.queue.len();
            out.extend(state.queue.drain(..));
            (taken, state.closed)
        };

        if taken > 0 {
            self.drained.fetch_add(taken as u64, Ordering::Relaxed);
            counter!(m::BUS_DRAINED_TOTAL).increment(taken as u64);
            self.not_full.notify_waiters();
        }
        closed
    }

    /// 버스를 닫고 대기 중인 생산자와 drain을 모두 깨웁니다.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_full.notify_waiters();
        self.not_empty.notify_waiters();
    }

    /// 버스가 닫혔는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// 현재 큐에 있는 엔트리 수
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// 큐가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 오버플로우 전략
    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }

    /// 지금까지 큐에 들어간 엔트리 수
    pub fn pushed_count(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// 지금까지 버려진 엔트리 수
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 지금까지 drain된 엔트리 수
    pub fn drained_count(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }

    /// 사용률을 0.0~1.0 범위로 반환합니다.
    pub fn utilization(&self) -> f64 {
        f64::from(u32::try_from(self.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }
}

impl<T> std::fmt::Debug for MetricBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricBus")
            .field("capacity", &self.capacity)
            .field("backpressure", &self.backpressure)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
