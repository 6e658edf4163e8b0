//! Vector Index - 정확한(brute-force) L2 최근접 이웃 인덱스
//!
//! 모든 행을 선형으로 스캔하므로 근사 검색이 아닙니다.
//! 거리가 같으면 먼저 삽입된 행이 앞에 옵니다.
//!
//! ## 디스크 형식
//! - `vectorized_db.bin`: `b"RAGFLAT1"` + dimension(`u32`) + rows(`u64`) + `rows × dimension`개의 `f32` (모두 little-endian)
//! - `vectorized_db_meta.txt`: 청크당 한 줄, `<source_path>|<text>`
//!
//! 청크 텍스트의 줄바꿈은 구축 시점에 공백으로 치환되므로 저장 전후의 검색 결과가 동일합니다.
//!
//! 바이너리의 i번째 행과 메타데이터의 i번째 줄은 항상 같은 청크입니다.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::IndexError;

use super::chunker::Chunk;

/// 벡터 파일 이름
pub const INDEX_FILE_NAME: &str = "vectorized_db.bin";
/// 메타데이터 사이드카 파일 이름
pub const META_FILE_NAME: &str = "vectorized_db_meta.txt";

const MAGIC: &[u8; 8] = b"RAGFLAT1";
const HEADER_LEN: usize = 8 + 4 + 8;

// ============================================================================
// Types
// ============================================================================

/// 인덱스 아티팩트 경로 쌍
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub index_path: PathBuf,
    pub meta_path: PathBuf,
}

impl IndexPaths {
    /// 인덱스 폴더 아래 기본 파일 이름으로 생성
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            index_path: dir.join(INDEX_FILE_NAME),
            meta_path: dir.join(META_FILE_NAME),
        }
    }

    /// 두 아티팩트가 모두 존재하는지
    pub fn exist(&self) -> bool {
        self.index_path.is_file() && self.meta_path.is_file()
    }
}

/// 인덱스에 저장된 청크 메타데이터 (한 줄 텍스트)
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    /// 원본 문서 경로
    pub source: String,
    /// 청크 텍스트
    pub text: String,
}

impl From<Chunk> for IndexedChunk {
    fn from(chunk: Chunk) -> Self {
        Self {
            source: flatten_newlines(&chunk.source.display().to_string()),
            text: flatten_newlines(&chunk.text),
        }
    }
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// 인덱스 행 번호
    pub row: usize,
    pub chunk: IndexedChunk,
    /// 제곱 L2 거리 (작을수록 가까움)
    pub distance: f32,
}

// ============================================================================
// FlatL2Index
// ============================================================================

/// 평면(flat) L2 인덱스
///
/// 구축 후에는 변경되지 않습니다. 재수집 시 통째로 다시 만듭니다.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimension: usize,
    /// row-major 벡터 데이터
    vectors: Vec<f32>,
    chunks: Vec<IndexedChunk>,
}

impl FlatL2Index {
    /// 청크와 벡터로 인덱스 구축 (같은 순서, 같은 길이)
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 && !vectors.is_empty() {
            return Err(IndexError::Corrupt("zero-dimensional embedding".to_string()));
        }

        let mut flat = Vec::with_capacity(dimension * vectors.len());
        for vector in &vectors {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    got: vector.len(),
                });
            }
            flat.extend_from_slice(vector);
        }

        Ok(Self {
            dimension,
            vectors: flat,
            chunks: chunks.into_iter().map(IndexedChunk::from).collect(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[IndexedChunk] {
        &self.chunks
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }

    /// k-NN 검색 (거리 오름차순, 최대 k개)
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(vec![]);
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            let distance = squared_l2(self.row(i), query);
            // NaN/inf 행은 유효하지 않은 행으로 취급
            if !distance.is_finite() {
                tracing::debug!("Skipping invalid index row {}", i);
                continue;
            }
            scored.push((i, distance));
        }

        // 안정 정렬: 같은 거리면 행 순서 유지
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(row, distance)| SearchResult {
                row,
                chunk: self.chunks[row].clone(),
                distance,
            })
            .collect())
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// 두 아티팩트를 기록
    ///
    /// 임시 파일에 먼저 쓰고 rename 합니다. 교체 전에 기존 사이드카를 지우므로
    /// 중간에 중단되면 사이드카가 없는 상태(`NotFound`)가 되고, 어긋난 쌍은 남지 않습니다.
    pub fn persist(&self, paths: &IndexPaths) -> Result<(), IndexError> {
        for path in [&paths.index_path, &paths.meta_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let index_tmp = tmp_path(&paths.index_path);
        let meta_tmp = tmp_path(&paths.meta_path);

        {
            let mut out = BufWriter::new(File::create(&index_tmp)?);
            out.write_all(MAGIC)?;
            out.write_all(&(self.dimension as u32).to_le_bytes())?;
            out.write_all(&(self.len() as u64).to_le_bytes())?;
            for v in &self.vectors {
                out.write_all(&v.to_le_bytes())?;
            }
            out.flush()?;
        }

        {
            let mut out = BufWriter::new(File::create(&meta_tmp)?);
            for chunk in &self.chunks {
                writeln!(out, "{}|{}", chunk.source, chunk.text)?;
            }
            out.flush()?;
        }

        // 사이드카가 마지막에 생기므로 그 전까지는 load가 NotFound
        match std::fs::remove_file(&paths.meta_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        std::fs::rename(&index_tmp, &paths.index_path)?;
        std::fs::rename(&meta_tmp, &paths.meta_path)?;

        tracing::info!(
            "Index persisted: {} rows, {} dimensions -> {:?}",
            self.len(),
            self.dimension,
            paths.index_path
        );
        Ok(())
    }

    /// 두 아티팩트에서 인덱스 복원
    pub fn load(paths: &IndexPaths) -> Result<Self, IndexError> {
        if !paths.exist() {
            return Err(IndexError::NotFound {
                index_path: paths.index_path.clone(),
                meta_path: paths.meta_path.clone(),
            });
        }

        let bytes = std::fs::read(&paths.index_path)?;
        if bytes.len() < HEADER_LEN || &bytes[..8] != MAGIC {
            return Err(IndexError::Corrupt(format!(
                "{:?} is not a vector index file",
                paths.index_path
            )));
        }

        let dimension = read_u32(&bytes, 8) as usize;
        let rows = read_u64(&bytes, 12) as usize;
        let expected_len = rows
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| IndexError::Corrupt("header overflows".to_string()))?;
        if bytes.len() != expected_len {
            return Err(IndexError::Corrupt(format!(
                "expected {} bytes for {} rows x {} dims, found {}",
                expected_len,
                rows,
                dimension,
                bytes.len()
            )));
        }

        let vectors: Vec<f32> = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let meta = std::fs::read_to_string(&paths.meta_path)?;
        let mut chunks = Vec::with_capacity(rows);
        for (line_no, line) in meta.lines().enumerate() {
            let (source, text) = line.split_once('|').ok_or_else(|| {
                IndexError::Corrupt(format!("metadata line {} has no '|'", line_no + 1))
            })?;
            chunks.push(IndexedChunk {
                source: source.to_string(),
                text: text.to_string(),
            });
        }

        if chunks.len() != rows {
            return Err(IndexError::Corrupt(format!(
                "{} metadata lines for {} vectors",
                chunks.len(),
                rows
            )));
        }

        tracing::info!("Index loaded: {} rows, {} dimensions", rows, dimension);

        Ok(Self {
            dimension,
            vectors,
            chunks,
        })
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 제곱 유클리드 거리
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// 메타데이터 한 줄에 들어가도록 줄바꿈을 공백으로 치환
fn flatten_newlines(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

// ============================================================================
// Tests
// ============================================================================
