//! 수집(ingestion) 파이프라인
//!
//! 탐색 → 추출 → 청킹 → 임베딩 → 인덱스 구축
//!
//! 파일 단위 추출 실패는 경고 후 건너뜁니다.
//! 임베딩 배치 실패는 전체 수집을 중단하며 부분 인덱스는 만들지 않습니다.

use std::path::{Path, PathBuf};

use crate::collector::{CollectionStats, FileCollector};
use crate::embedding::EmbeddingProvider;
use crate::error::IngestError;
use crate::extractor::ContentExtractor;

use super::chunker::{Chunk, Chunker};
use super::vector::FlatL2Index;

/// 수집 결과 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// 발견된 문서 수
    pub files_found: usize,
    /// 추출에 성공한 문서 수
    pub files_extracted: usize,
    /// 추출 실패로 건너뛴 문서
    pub skipped: Vec<PathBuf>,
    /// 발견된 문서의 총 크기 (바이트)
    pub total_bytes: u64,
    /// 생성된 청크 수
    pub chunks: usize,
}

/// 문서 루트 전체를 수집하여 새 인덱스 구축
///
/// `exclude`(인덱스 폴더)는 탐색에서 제외됩니다.
pub async fn ingest_directory(
    root: &Path,
    exclude: &Path,
    chunker: &dyn Chunker,
    embedder: &dyn EmbeddingProvider,
) -> Result<(FlatL2Index, IngestReport), IngestError> {
    let files = FileCollector::with_defaults()
        .exclude(exclude)
        .collect_directory(root)?;

    if files.is_empty() {
        return Err(IngestError::NoDocuments(root.to_path_buf()));
    }

    let stats = CollectionStats::from_files(&files);
    tracing::info!(
        "Processing {} documents ({} pdf, {} docx, {} txt)",
        stats.total_files,
        stats.pdf_files,
        stats.docx_files,
        stats.text_files
    );

    let extractor = ContentExtractor::new();
    let mut report = IngestReport {
        files_found: files.len(),
        total_bytes: stats.total_size,
        ..Default::default()
    };
    let mut chunks: Vec<Chunk> = Vec::new();

    for file in &files {
        match extractor.extract(file).await {
            Ok(doc) => {
                report.files_extracted += 1;
                let source_type = doc.source_type;
                let doc_chunks = chunker.chunk_document(doc.path, &doc.text);
                tracing::debug!(
                    "{:?} ({:?}) -> {} chunks",
                    file.path,
                    source_type,
                    doc_chunks.len()
                );
                chunks.extend(doc_chunks);
            }
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", file.path, e);
                report.skipped.push(file.path.clone());
            }
        }
    }

    if chunks.is_empty() {
        return Err(IngestError::NoExtractableDocuments {
            root: root.to_path_buf(),
            attempted: files.len(),
        });
    }
    report.chunks = chunks.len();

    tracing::info!(
        "Generating embeddings for {} chunks with {}",
        chunks.len(),
        embedder.name()
    );
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;

    if vectors.len() != chunks.len() {
        return Err(IngestError::Embedding(
            crate::error::EmbeddingError::CountMismatch {
                expected: chunks.len(),
                got: vectors.len(),
            },
        ));
    }

    let dimension = vectors[0].len();
    if let Some((row, v)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != dimension)
    {
        return Err(IngestError::DimensionMismatch {
            row,
            expected: dimension,
            got: v.len(),
        });
    }

    let index = FlatL2Index::build(chunks, vectors)?;
    tracing::info!(
        "Index built: {} chunks from {} documents, {} dimensions",
        index.len(),
        report.files_extracted,
        index.dimension()
    );

    Ok((index, report))
}

// ============================================================================
// Tests
// ============================================================================
