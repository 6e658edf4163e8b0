//! 콘텐츠 추출 모듈
//!
//! 파일 형식별로 평문 텍스트를 추출합니다.
//! - PDF: pdf-extract로 페이지별 추출 후 줄바꿈으로 연결
//! - DOCX: zip + quick-xml로 문단 텍스트 추출
//! - TXT: 인코딩 우선순위에 따라 디코딩, 최종적으로 손실 디코딩

pub mod docx;
pub mod pdf;
pub mod text;

use std::path::{Path, PathBuf};

use crate::collector::{CollectedFile, FileType};
use crate::error::ExtractError;

pub use text::{decode_text, TextEncoding};

// ============================================================================
// Extracted Document
// ============================================================================

/// 추출된 문서
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// 원본 파일 경로
    pub path: PathBuf,
    /// 원본 파일 타입
    pub source_type: FileType,
    /// 추출된 텍스트
    pub text: String,
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 콘텐츠 추출기
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 수집된 파일에서 텍스트 추출
    pub async fn extract(&self, file: &CollectedFile) -> Result<ExtractedDocument, ExtractError> {
        let text = match file.file_type {
            FileType::Text => self.extract_text(&file.path).await?,
            FileType::Pdf => self.extract_blocking(&file.path, pdf::extract_text_from_pdf).await?,
            FileType::Docx => {
                self.extract_blocking(&file.path, docx::extract_text_from_docx)
                    .await?
            }
        };

        tracing::debug!(
            "Extracted {} chars from {:?}",
            text.chars().count(),
            file.path
        );

        Ok(ExtractedDocument {
            path: file.path.clone(),
            source_type: file.file_type,
            text,
        })
    }

    /// 텍스트 파일에서 추출
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let (text, encoding) = decode_text(&bytes);
        if encoding == TextEncoding::Lossy {
            tracing::warn!(
                "No encoding matched {:?}, decoded with replacement characters",
                path
            );
        } else {
            tracing::debug!("Decoded {:?} as {}", path, encoding.as_str());
        }
        Ok(text)
    }

    /// PDF/DOCX 파싱은 CPU 바운드이므로 spawn_blocking 사용
    async fn extract_blocking(
        &self,
        path: &Path,
        f: fn(&Path) -> Result<String, ExtractError>,
    ) -> Result<String, ExtractError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| ExtractError::Task(e.to_string()))?
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn collected(path: PathBuf, file_type: FileType) -> CollectedFile {
        CollectedFile {
            path,
            file_type,
            size: 0,
        }
    }

    #[tokio::test]
    async fn test_extract_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "The capital of Freedonia is Fredville.").unwrap();

        let doc = ContentExtractor::new()
            .extract(&collected(path.clone(), FileType::Text))
            .await
            .unwrap();
        assert_eq!(doc.text, "The capital of Freedonia is Fredville.");
        assert_eq!(doc.path, path);
    }

    #[tokio::test]
    async fn test_extract_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ContentExtractor::new()
            .extract(&collected(dir.path().join("gone.txt"), FileType::Text))
            .await;
        assert!(matches!(result, Err(ExtractError::Io { .. })));
    }

    #[tokio::test]
    async fn test_extract_corrupt_docx_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"nope").unwrap();

        let result = ContentExtractor::new()
            .extract(&collected(path, FileType::Docx))
            .await;
        assert!(matches!(result, Err(ExtractError::Docx { .. })));
    }

    #[tokio::test]
    async fn test_extract_corrupt_pdf_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        // pdf-extract가 panic 하면 spawn_blocking이 Task 에러로 바꿈
        let result = ContentExtractor::new()
            .extract(&collected(path, FileType::Pdf))
            .await;
        assert!(matches!(
            result,
            Err(ExtractError::Pdf { .. } | ExtractError::Task(_))
        ));
    }
}
