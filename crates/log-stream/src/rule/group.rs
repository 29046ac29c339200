//! 그룹 -- 파일 마스크와 규칙 목록을 묶는 설정 단위

use std::path::Path;
use std::sync::Arc;

use regex::Regex;

use logstreamer_core::config::GroupConfig;

use super::date::DateLayout;
use super::matcher::Rule;
use crate::error::LogStreamError;

/// tail 시작 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// 파일 처음부터 (과거 라인 재생)
    Beginning,
    /// 바인딩을 연 시점의 파일 끝부터
    End,
}

/// 컴파일된 그룹
///
/// 생성 후에는 변경되지 않으며 `Arc<Group>`으로 모든 tailer가 공유합니다.
#[derive(Debug)]
pub struct Group {
    index: usize,
    name: String,
    mask: Regex,
    rules: Vec<Rule>,
    date_layout: Option<DateLayout>,
}

impl Group {
    /// 선언 순서(`index`)와 설정으로 그룹을 컴파일합니다.
    ///
    /// 이름이 없으면 `group<index>`를 사용합니다.
    pub fn compile(index: usize, config: &GroupConfig) -> Result<Self, LogStreamError> {
        let name = match config.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_owned(),
            _ => format!("group{index}"),
        };

        let mask = Regex::new(&config.mask).map_err(|e| LogStreamError::Construction {
            what: format!("group '{name}' mask"),
            reason: e.to_string(),
        })?;

        let rules = config
            .rules
            .iter()
            .map(|pattern| Rule::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        let date_layout = config.date_format().map(DateLayout::new).transpose()?;

        Ok(Self {
            index,
            name,
            mask,
            rules,
            date_layout,
        })
    }

    /// 설정 목록 전체를 선언 순서대로 컴파일합니다.
    pub fn compile_all(configs: &[GroupConfig]) -> Result<Vec<Arc<Self>>, LogStreamError> {
        configs
            .iter()
            .enumerate()
            .map(|(index, config)| Self::compile(index, config).map(Arc::new))
            .collect()
    }

    /// 선언 순서 인덱스
    pub fn index(&self) -> usize {
        self.index
    }

    /// 그룹 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 파일 마스크
    pub fn mask(&self) -> &Regex {
        &self.mask
    }

    /// 규칙 목록 (선언 순서)
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// 날짜 형식
    pub fn date_layout(&self) -> Option<&DateLayout> {
        self.date_layout.as_ref()
    }

    /// 날짜 형식이 설정되어 있는지 여부
    pub fn has_date_format(&self) -> bool {
        self.date_layout.is_some()
    }

    /// 새 바인딩의 시작 위치
    pub fn start_position(&self) -> StartPosition {
        if self.has_date_format() {
            StartPosition::Beginning
        } else {
            StartPosition::End
        }
    }

    /// 파일 기본 이름이 마스크에 매칭되는지 확인합니다.
    pub fn matches_file(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.mask.is_match(&name.to_string_lossy()))
            .unwrap_or(false)
    }
}
