//! 규칙 엔진 -- 라인에서 필드를 추출해 메트릭으로 변환
//!
//! # 처리 흐름
//! 1. 그룹의 모든 규칙을 선언 순서대로 적용 (첫 매칭에서 멈추지 않음)
//! 2. 매칭된 규칙마다 [`process`]로 `date` 필드를 타임스탬프로 변환
//! 3. 결과 [`Metric`]을 호출자(tailer)에게 반환
//!
//! 한 라인이 0개, 1개 또는 여러 개의 메트릭을 만들 수 있습니다.

mod date;
mod group;
mod matcher;

pub use date::{DateLayout, go_layout_to_strftime};
pub use group::{Group, StartPosition};
pub use matcher::Rule;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::warn;

use logstreamer_core::metrics as m;

use crate::error::LogStreamError;
use crate::metric::Metric;

/// 캡처 이름 → 캡처 문자열
pub type Fields = BTreeMap<String, String>;

/// 날짜 캡처 필드 이름
pub const DATE_FIELD: &str = "date";

/// 추출된 필드로 메트릭을 만듭니다.
///
/// 그룹에 날짜 형식이 있고 `date` 필드가 있으면 파싱해서 타임스탬프로 쓰고
/// 필드에서 제거합니다. 그 외에는 현재 시각을 씁니다.
pub fn process(
    group: &Arc<Group>,
    source: &Arc<Path>,
    mut fields: Fields,
) -> Result<Metric, LogStreamError> {
    let timestamp = match (group.date_layout(), fields.get(DATE_FIELD)) {
        (Some(layout), Some(raw)) => {
            let parsed = layout.parse(raw)?;
            fields.remove(DATE_FIELD);
            parsed
        }
        _ => Utc::now(),
    };

    Ok(Metric::new(
        Arc::clone(group),
        Arc::clone(source),
        fields,
        timestamp,
    ))
}

/// 라인 하나에 그룹의 모든 규칙을 적용합니다.
///
/// 날짜 파싱에 실패한 매칭은 경고와 카운터만 남기고 버립니다.
/// 미매칭 카운터는 어떤 규칙도 매칭되지 않은 라인만 셉니다.
pub fn evaluate(group: &Arc<Group>, source: &Arc<Path>, line: &str) -> Vec<Metric> {
    let Evaluation { metrics, matched } = apply_rules(group, source, line);

    if !matched {
        counter!(m::LINES_UNMATCHED_TOTAL, m::LABEL_GROUP => group.name().to_owned()).increment(1);
    }

    metrics
}

struct Evaluation {
    metrics: Vec<Metric>,
    /// 규칙이 하나라도 매칭되었는지 (날짜 실패 포함)
    matched: bool,
}

fn apply_rules(group: &Arc<Group>, source: &Arc<Path>, line: &str) -> Evaluation {
    let mut metrics = Vec::new();
    let mut matched = false;

    for rule in group.rules() {
        let Some(fields) = rule.matches(line) else {
            continue;
        };
        matched = true;
        counter!(m::RULE_MATCHES_TOTAL, m::LABEL_GROUP => group.name().to_owned()).increment(1);

        match process(group, source, fields) {
            Ok(metric) => metrics.push(metric),
            Err(e) => {
                counter!(m::DATE_PARSE_ERRORS_TOTAL, m::LABEL_GROUP => group.name().to_owned())
                    .increment(1);
                warn!(
                    group = group.name(),
                    path = %source.display(),
                    error = %e,
                    "dropping metric with unparsable date"
                );
            }
        }
    }

    Evaluation { metrics, matched }
}
