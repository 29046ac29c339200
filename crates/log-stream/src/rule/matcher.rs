//! 라인 규칙 -- 이름 있는 캡처 그룹으로 필드 추출
//!
//! [`Rule`]은 컴파일된 정규식과 캡처 이름 목록을 함께 보관하는 값 객체입니다.
//! 정규식은 생성 시 한 번만 컴파일하고, 캡처 이름도 그때 미리 뽑아둡니다.

use regex::Regex;

use super::Fields;
use crate::error::LogStreamError;

/// 라인 하나에서 필드를 추출하는 규칙
#[derive(Debug, Clone)]
pub struct Rule {
    /// 컴파일된 정규식
    pattern: Regex,
    /// 이름 있는 캡처 그룹 (선언 순서)
    capture_names: Vec<String>,
}

impl Rule {
    /// 정규식 문자열로 규칙을 생성합니다.
    ///
    /// 정규식이 유효하지 않으면 `Construction` 에러를 반환합니다.
    pub fn new(pattern: &str) -> Result<Self, LogStreamError> {
        let pattern = Regex::new(pattern).map_err(|e| LogStreamError::Construction {
            what: format!("rule '{pattern}'"),
            reason: e.to_string(),
        })?;
        let capture_names = pattern
            .capture_names()
            .flatten()
            .map(str::to_owned)
            .collect();

        Ok(Self {
            pattern,
            capture_names,
        })
    }

    /// 컴파일된 정규식을 반환합니다.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// 원본 정규식 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// 이름 있는 캡처 그룹 목록을 반환합니다.
    pub fn capture_names(&self) -> &[String] {
        &self.capture_names
    }

    /// 라인에 규칙을 적용합니다.
    ///
    /// 전체 패턴이 매칭되지 않거나 이름 있는 캡처가 하나도 없으면 `None`.
    /// 매칭되면 모든 이름 있는 캡처를 반환하며, 참여하지 않은 선택적 그룹은
    /// 빈 문자열이 됩니다.
    pub fn matches(&self, line: &str) -> Option<Fields> {
        if self.capture_names.is_empty() {
            return None;
        }

        let captures = self.pattern.captures(line)?;
        let fields = self
            .capture_names
            .iter()
            .map(|name| {
                let value = captures.name(name).map_or("", |m| m.as_str());
                (name.clone(), value.to_owned())
            })
            .collect();
        Some(fields)
    }
}
