//! 메트릭 -- 규칙 매칭 하나가 만든 결과 레코드

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::rule::{Fields, Group};

/// 규칙 매칭 결과
///
/// 그룹과 원본 파일 경로는 `Arc`로 공유되므로 복제 비용이 작습니다.
#[derive(Debug, Clone)]
pub struct Metric {
    group: Arc<Group>,
    source: Arc<Path>,
    fields: Fields,
    timestamp: DateTime<Utc>,
}

impl Metric {
    /// 새 메트릭을 생성합니다.
    pub fn new(
        group: Arc<Group>,
        source: Arc<Path>,
        fields: Fields,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            group,
            source,
            fields,
            timestamp,
        }
    }

    /// 메트릭을 만든 그룹
    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }

    /// 라인을 읽은 파일 경로
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// 추출된 필드 (`date`는 타임스탬프로 쓰였다면 제외)
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// 타임스탬프
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// 필드 소유권을 가져갑니다.
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}
