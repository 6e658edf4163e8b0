//! 파일 수집 모듈
//!
//! 문서 루트 아래를 재귀적으로 탐색하여 `.pdf`, `.docx`, `.txt` 파일을 찾습니다.
//! 확장자는 대소문자를 구분하지 않습니다.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::{ConfigError, IngestError};

// ============================================================================
// File Types
// ============================================================================

/// 지원하는 문서 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// PDF 문서
    Pdf,
    /// Word 문서 (OOXML)
    Docx,
    /// 일반 텍스트
    Text,
}

impl FileType {
    /// 확장자로 파일 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "docx" => Some(FileType::Docx),
            "txt" => Some(FileType::Text),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    /// 파일 경로 (루트 기준으로 결합된 경로)
    pub path: PathBuf,
    /// 파일 타입
    pub file_type: FileType,
    /// 파일 크기 (바이트)
    pub size: u64,
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 탐색에서 제외할 디렉터리 (인덱스 폴더 등)
    pub exclude: Vec<PathBuf>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: false,
            include_hidden: true,
            exclude: vec![],
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 제외 디렉터리 추가
    pub fn exclude(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.exclude.push(dir.into());
        self
    }

    /// 폴더 재귀 수집
    ///
    /// 결과는 경로 순으로 정렬되어 수집 순서가 실행마다 같습니다.
    pub fn collect_directory(&self, root: &Path) -> Result<Vec<CollectedFile>, IngestError> {
        if !root.is_dir() {
            return Err(IngestError::Discovery(
                ConfigError::MissingRoot(root.to_path_buf()).to_string(),
            ));
        }

        let excluded: Vec<PathBuf> = self
            .config
            .exclude
            .iter()
            .map(|p| canonical_or_self(p))
            .collect();

        let walker = WalkBuilder::new(root)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .ignore(self.config.respect_gitignore)
            .parents(self.config.respect_gitignore)
            .sort_by_file_path(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let path = canonical_or_self(entry.path());
                !excluded.iter().any(|ex| path.starts_with(ex))
            })
            .build();

        let mut files = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            let Some(file_type) = FileType::from_path(entry.path()) else {
                continue;
            };

            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    tracing::warn!("Failed to read metadata for {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            files.push(CollectedFile {
                path: entry.path().to_path_buf(),
                file_type,
                size,
            });
        }

        tracing::info!("Collected {} files from {:?}", files.len(), root);
        Ok(files)
    }
}

fn canonical_or_self(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub total_files: usize,
    pub pdf_files: usize,
    pub docx_files: usize,
    pub text_files: usize,
    pub total_size: u64,
}

impl CollectionStats {
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;

            match file.file_type {
                FileType::Pdf => stats.pdf_files += 1,
                FileType::Docx => stats.docx_files += 1,
                FileType::Text => stats.text_files += 1,
            }
        }

        stats
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_extension("txt"), Some(FileType::Text));
        assert_eq!(FileType::from_extension("PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_extension("DocX"), Some(FileType::Docx));
        assert_eq!(FileType::from_extension("md"), None);
        assert_eq!(FileType::from_extension("doc"), None);
    }

    #[test]
    fn test_collect_directory_recursive_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("nested/deeper")).unwrap();
        std::fs::write(root.join("a.txt"), "alpha").unwrap();
        std::fs::write(root.join("B.TXT"), "beta").unwrap();
        std::fs::write(root.join("notes.md"), "ignored").unwrap();
        std::fs::write(root.join("nested/deeper/c.pdf"), b"%PDF").unwrap();
        std::fs::write(root.join("nested/d.docx"), b"PK").unwrap();

        let files = FileCollector::with_defaults().collect_directory(root).unwrap();
        let stats = CollectionStats::from_files(&files);

        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.text_files, 2);
        assert_eq!(stats.pdf_files, 1);
        assert_eq!(stats.docx_files, 1);
    }

    #[test]
    fn test_collect_excludes_index_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("index")).unwrap();
        std::fs::write(root.join("doc.txt"), "keep").unwrap();
        std::fs::write(root.join("index/vectorized_db_meta.txt"), "skip").unwrap();

        let files = FileCollector::with_defaults()
            .exclude(root.join("index"))
            .collect_directory(root)
            .unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("doc.txt"));
    }

    #[test]
    fn test_collect_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileCollector::with_defaults().collect_directory(&dir.path().join("nope"));
        assert!(matches!(result, Err(IngestError::Discovery(_))));
    }
}
