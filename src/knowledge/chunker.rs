//! Text Chunking Module
//!
//! 고정 크기 슬라이딩 윈도우로 텍스트를 분할합니다.
//! 윈도우 길이와 오버랩은 모두 문자(char) 단위입니다.

use std::path::PathBuf;

use crate::error::ConfigError;

/// 최소 청크 크기 (문자 수)
pub const MIN_CHUNK_SIZE: usize = 100;
/// 기본 청크 크기 (문자 수)
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// 기본 오버랩 (문자 수)
pub const DEFAULT_OVERLAP: usize = 25;

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 윈도우 길이 (문자 수)
    pub chunk_size: usize,
    /// 이전 청크와 겹치는 문자 수
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkConfig {
    /// `chunk_size >= 100` 그리고 `overlap < chunk_size`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(ConfigError::ChunkSizeTooSmall {
                min: MIN_CHUNK_SIZE,
                got: self.chunk_size,
            });
        }
        if self.overlap >= self.chunk_size {
            return Err(ConfigError::InvalidOverlap {
                overlap: self.overlap,
                chunk_size: self.chunk_size,
            });
        }
        Ok(())
    }

    /// 윈도우 이동 간격
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// 인덱싱 단위 청크
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 원본 문서 경로
    pub source: PathBuf,
    /// 청크 텍스트
    pub text: String,
    /// 문서 내 순번 (0-based)
    pub position: usize,
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;

    /// 문서 하나를 [`Chunk`] 목록으로 변환
    fn chunk_document(&self, source: PathBuf, text: &str) -> Vec<Chunk> {
        self.chunk(text)
            .into_iter()
            .enumerate()
            .map(|(position, text)| Chunk {
                source: source.clone(),
                text,
                position,
            })
            .collect()
    }
}

// ============================================================================
// WindowChunker
// ============================================================================

/// 슬라이딩 윈도우 청커
///
/// `chunk_size` 길이의 윈도우를 `chunk_size - overlap`씩 이동하며 잘라냅니다.
/// 공백만 남는 윈도우는 버리고, 마지막 윈도우는 더 짧을 수 있습니다.
#[derive(Debug, Clone)]
pub struct WindowChunker {
    config: ChunkConfig,
}

impl WindowChunker {
    /// 설정 검증 후 생성
    pub fn new(config: ChunkConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정 (1000 / 25)
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }
}

impl Chunker for WindowChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        // 문자 경계의 바이트 오프셋 (마지막에 text.len() 포함)
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = bounds.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < char_count {
            let end = (start + self.config.chunk_size).min(char_count);
            let window = &text[bounds[start]..bounds[end]];
            if !window.trim().is_empty() {
                chunks.push(window.to_string());
            }
            start += self.config.step();
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "WindowChunker"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, overlap: usize) -> WindowChunker {
        WindowChunker::new(ChunkConfig {
            chunk_size,
            overlap,
        })
        .unwrap()
    }

    #[test]
    fn test_chunker_empty() {
        assert!(WindowChunker::with_defaults().chunk("").is_empty());
        assert!(WindowChunker::with_defaults().chunk("   \n\t ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let text = "a".repeat(50);
        let chunks = chunker(100, 25).chunk(&text);
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn test_window_lengths_and_overlap() {
        let text: String = (0..1234).map(|i| char::from(b'a' + (i % 26) as u8)).collect();

        for (size, overlap) in [(100, 0), (100, 25), (150, 99), (300, 1)] {
            let chunks = chunker(size, overlap).chunk(&text);
            assert!(!chunks.is_empty());

            for chunk in &chunks {
                assert!(chunk.chars().count() <= size);
            }

            for pair in chunks.windows(2) {
                let prev: Vec<char> = pair[0].chars().collect();
                let next: Vec<char> = pair[1].chars().collect();
                if next.len() < overlap {
                    continue;
                }
                let tail = &prev[prev.len() - overlap..];
                let head = &next[..overlap];
                assert_eq!(tail, head, "size={} overlap={}", size, overlap);
            }
        }
    }

    #[test]
    fn test_steps_by_chunk_size_minus_overlap() {
        let text: String = "0123456789".repeat(25); // 250 chars
        let chunks = chunker(100, 20).chunk(&text);

        // 시작 위치: 0, 80, 160, 240
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].as_str(), &text[80..180]);
        assert_eq!(chunks[2].as_str(), &text[160..250]);
        assert_eq!(chunks[3].as_str(), &text[240..250]);
    }

    #[test]
    fn test_multibyte_text_counts_chars() {
        let text = "가".repeat(150);
        let chunks = chunker(100, 10).chunk(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 100);
        assert_eq!(chunks[1].chars().count(), 60);
    }

    #[test]
    fn test_whitespace_windows_are_dropped() {
        let text = format!("{}{}", "x".repeat(100), " ".repeat(200));
        let chunks = chunker(100, 0).chunk(&text);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        assert!(matches!(
            WindowChunker::new(ChunkConfig {
                chunk_size: 50,
                overlap: 0
            }),
            Err(ConfigError::ChunkSizeTooSmall { .. })
        ));
        assert!(matches!(
            WindowChunker::new(ChunkConfig {
                chunk_size: 100,
                overlap: 100
            }),
            Err(ConfigError::InvalidOverlap { .. })
        ));
    }

    #[test]
    fn test_chunk_document_positions() {
        let text = "b".repeat(250);
        let chunks = chunker(100, 0).chunk_document(PathBuf::from("doc.txt"), &text);
        let positions: Vec<usize> = chunks.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert!(chunks.iter().all(|c| c.source == PathBuf::from("doc.txt")));
    }
}
