//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;

use crate::error::ExtractError;

/// PDF에서 텍스트 추출
///
/// 페이지별 텍스트를 줄바꿈으로 이어 붙여 반환합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(String::new());
    }

    Ok(join_pages(&text))
}

/// 폼피드(\x0c)로 구분된 페이지를 줄바꿈으로 연결
fn join_pages(text: &str) -> String {
    let mut pages: Vec<&str> = text.split('\x0c').map(str::trim_end).collect();
    // 마지막 폼피드 뒤의 빈 조각
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages.join("\n")
}

// ============================================================================
// Tests
// ============================================================================
