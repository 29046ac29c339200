//! 파일 탐색과 그룹 배정

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::TailBinding;
use crate::error::LogStreamError;
use crate::rule::Group;

/// 루트 디렉토리들을 재귀 탐색해 일반 파일의 절대 경로를 반환합니다.
///
/// 디렉토리와 특수 파일은 제외합니다. 심볼릭 링크는 따라 내려가지 않으며,
/// 일반 파일을 가리키는 링크만 포함하고 끊어진 링크는 경고 후 건너뜁니다.
/// 디렉토리를 읽지 못하면 `Discovery` 에러를 반환합니다.
pub fn discover(dirs: &[PathBuf]) -> Result<Vec<PathBuf>, LogStreamError> {
    let mut files = Vec::new();

    for dir in dirs {
        debug!(dir = %dir.display(), "walking log directory");
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry.map_err(|e| LogStreamError::Discovery {
                path: e
                    .path()
                    .unwrap_or(dir.as_path())
                    .display()
                    .to_string(),
                reason: e.to_string(),
            })?;

            if is_regular_file(&entry) {
                files.push(absolute(entry.path())?);
            }
        }
    }

    Ok(files)
}

fn is_regular_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if !file_type.is_symlink() {
        return file_type.is_file();
    }

    match std::fs::metadata(entry.path()) {
        Ok(meta) => meta.is_file(),
        Err(e) => {
            warn!(
                path = %entry.path().display(),
                error = %e,
                "skipping dangling symlink"
            );
            false
        }
    }
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf, LogStreamError> {
    std::path::absolute(path).map_err(|e| LogStreamError::Discovery {
        path: path.display().to_string(),
        reason: format!("can't get absolute path: {e}"),
    })
}

/// 경로 목록을 그룹에 배정하고 바인딩을 엽니다.
///
/// 그룹 선언 순서대로, 각 그룹마다 전체 경로를 훑어 기본 이름이 마스크에
/// 매칭되는 경로마다 바인딩 하나를 만듭니다. 한 경로가 여러 그룹에 매칭되면
/// 그룹마다 독립된 바인딩이 생깁니다. 바인딩 하나라도 열지 못하면 전체가 실패합니다.
pub async fn assign(
    paths: &[PathBuf],
    groups: &[Arc<Group>],
) -> Result<Vec<TailBinding>, LogStreamError> {
    let mut bindings = Vec::new();

    for group in groups {
        debug!(group = group.name(), mask = group.mask().as_str(), "assigning files");
        for path in paths.iter().filter(|p| group.matches_file(p)) {
            bindings.push(TailBinding::open(path, group).await?);
        }
    }

    Ok(bindings)
}
