//! 리포터 -- 메트릭을 타입이 있는 포인트로 변환
//!
//! 필드 이름 접미어로 타입을 결정합니다.
//! - `_string_value`: 접미어를 뗀 이름의 문자열 필드
//! - `_value`: 접미어를 뗀 이름의 숫자 필드 (정수 우선, 실패하면 실수)
//! - 그 외: 태그
//!
//! 키는 모두 소문자로 바꾸고, `group` 태그에는 항상 그룹 이름이 들어갑니다.
//! 측정값 이름은 그룹 이름입니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use logstreamer_core::metrics as m;

use crate::error::{FieldCoercionError, LogStreamError};
use crate::metric::Metric;

const STRING_VALUE_SUFFIX: &str = "_string_value";
const VALUE_SUFFIX: &str = "_value";
const GROUP_TAG: &str = "group";

/// 포인트 필드 값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// 정수
    Integer(i64),
    /// 실수
    Float(f64),
    /// 문자열
    String(String),
}

/// 리포트된 포인트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// 측정값 이름 (그룹 이름)
    pub measurement: String,
    /// 태그
    pub tags: BTreeMap<String, String>,
    /// 타입이 있는 필드
    pub fields: BTreeMap<String, FieldValue>,
    /// 타임스탬프
    pub timestamp: DateTime<Utc>,
}

/// 메트릭 하나를 포인트로 변환합니다.
///
/// 숫자로 바꿀 수 없는 `_value` 필드는 건너뛰고 실패 목록으로 돌려줍니다.
pub fn report(metric: &Metric) -> (Point, Vec<FieldCoercionError>) {
    let group = metric.group().name();
    let mut tags = BTreeMap::new();
    let mut fields = BTreeMap::new();
    let mut failures = Vec::new();

    for (key, value) in metric.fields() {
        let key = key.to_lowercase();

        if let Some(name) = key.strip_suffix(STRING_VALUE_SUFFIX) {
            fields.insert(name.to_owned(), FieldValue::String(value.clone()));
        } else if let Some(name) = key.strip_suffix(VALUE_SUFFIX) {
            match coerce_number(value) {
                Some(number) => {
                    fields.insert(name.to_owned(), number);
                }
                None => failures.push(FieldCoercionError {
                    group: group.to_owned(),
                    key: key.clone(),
                    value: value.clone(),
                }),
            }
        } else {
            tags.insert(key, value.clone());
        }
    }

    tags.insert(GROUP_TAG.to_owned(), group.to_owned());

    let point = Point {
        measurement: group.to_owned(),
        tags,
        fields,
        timestamp: metric.timestamp(),
    };
    (point, failures)
}

fn coerce_number(raw: &str) -> Option<FieldValue> {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        return Some(FieldValue::Integer(i));
    }
    raw.parse::<f64>().ok().map(FieldValue::Float)
}

/// drain 윈도우 하나의 리포트 결과
#[derive(Debug)]
pub struct BatchReport {
    /// 변환된 포인트
    pub points: Vec<Point>,
    /// 변환 실패를 모은 에러 (실패가 없으면 `None`)
    pub error: Option<LogStreamError>,
}

impl BatchReport {
    /// 실패를 `Result`로 바꿉니다. 포인트는 성공 여부와 관계없이 반환합니다.
    pub fn into_result(self) -> (Vec<Point>, Result<(), LogStreamError>) {
        let result = match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        };
        (self.points, result)
    }
}

/// drain된 메트릭 전체를 변환합니다.
///
/// 실패한 필드만 빠지고 나머지 필드와 메트릭은 모두 리포트됩니다.
/// 모든 실패는 `Coercion` 에러 하나로 모입니다.
pub fn report_batch(metrics: &[Metric]) -> BatchReport {
    let mut points = Vec::with_capacity(metrics.len());
    let mut failures = Vec::new();

    for metric in metrics {
        let (point, mut failed) = report(metric);
        points.push(point);
        failures.append(&mut failed);
    }

    let error = if failures.is_empty() {
        None
    } else {
        counter!(m::REPORT_COERCION_ERRORS_TOTAL).increment(failures.len() as u64);
        let err = LogStreamError::Coercion(failures);
        warn!(error = %err, "field coercion failed");
        Some(err)
    };

    BatchReport { points, error }
}
