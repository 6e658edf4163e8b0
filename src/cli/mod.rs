//! CLI 모듈
//!
//! rag-agent CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::{AgentLoop, ChatSession, OpenAiChatModel, RetrievalTool, ToolRegistry, APOLOGY};
use crate::config::Config;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::knowledge::{
    EngineOptions, EngineRegistry, FlatL2Index, IndexOrigin, IndexPaths, RetrievalEngine,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "rag-agent")]
#[command(version, about = "로컬 문서 RAG 에이전트", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// 모든 명령어에 공통인 옵션 (환경변수보다 우선)
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// 문서 루트 디렉토리
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 인덱스 폴더 (기본: <data-dir>/index)
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    /// 청크 크기 (문자 수, 최소 100)
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// 청크 오버랩 (문자 수)
    #[arg(long, global = true)]
    pub overlap: Option<usize>,

    /// 로그 레벨 (RUST_LOG가 있으면 무시)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// 로그 파일 디렉토리
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// 로그 파일 비활성화
    #[arg(long, global = true)]
    pub no_log_file: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 대화형 채팅 (기본)
    Chat(ChatArgs),

    /// 인덱스 구축 (아티팩트가 있으면 로드만)
    Ingest {
        /// 기존 인덱스가 있어도 재구축
        #[arg(long)]
        force: bool,
    },

    /// 검색 엔진 단독 질의
    Query {
        /// 질문
        query: String,

        /// 결과 개수 (1-10)
        #[arg(short, default_value = "3")]
        k: usize,
    },

    /// 상태 확인
    Status,
}

#[derive(Args, Debug, Default)]
pub struct ChatArgs {
    /// 채팅 모델
    #[arg(long)]
    pub model: Option<String>,

    /// 사용자 턴당 재시도 예산
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// 시스템 프롬프트에 넣을 사용자 이름
    #[arg(long)]
    pub user: Option<String>,
}

impl Cli {
    /// CLI 플래그를 설정에 덮어쓰기
    pub fn apply(&self, config: &mut Config) {
        let g = &self.global;
        if let Some(dir) = &g.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &g.index_dir {
            config.index_dir = Some(dir.clone());
        }
        if let Some(size) = g.chunk_size {
            config.chunking.chunk_size = size;
        }
        if let Some(overlap) = g.overlap {
            config.chunking.overlap = overlap;
        }
        if let Some(level) = &g.log_level {
            config.log.level = level.clone();
        }
        if let Some(dir) = &g.log_dir {
            config.log.dir = dir.clone();
        }
        if g.no_log_file {
            config.log.to_file = false;
        }

        if let Some(Commands::Chat(chat)) = &self.command {
            if let Some(model) = &chat.model {
                config.agent.chat_model = model.clone();
            }
            if let Some(retries) = chat.max_retries {
                config.agent.max_retries = retries;
            }
            if let Some(user) = &chat.user {
                config.agent.user_name = Some(user.clone());
            }
        }
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        None | Some(Commands::Chat(_)) => cmd_chat(&config).await,
        Some(Commands::Ingest { force }) => cmd_ingest(&config, force).await,
        Some(Commands::Query { query, k }) => cmd_query(&config, &query, k).await,
        Some(Commands::Status) => cmd_status(&config).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    config.require_api_key().context(
        "API 키가 설정되지 않았습니다.\n\n\
         설정 방법:\n  \
         export OPENAI_API_KEY=your-api-key\n  \
         또는 .env 파일에 OPENAI_API_KEY=... 추가",
    )?;
    let embedder = create_embedder(&config.api, &config.embedding)?;
    Ok(Arc::new(embedder))
}

/// 채팅 명령어 (chat)
///
/// 검색 엔진을 초기화한 뒤 REPL을 실행합니다.
async fn cmd_chat(config: &Config) -> Result<()> {
    let embedder = embedder(config)?;

    println!("[*] 검색 엔진 초기화 중: {}", config.data_dir.display());
    let registry = EngineRegistry::new();
    let engine = registry
        .get_or_init(EngineOptions::from_config(config), embedder)
        .await
        .context("검색 엔진 초기화 실패")?;
    println!("[OK] 인덱스 준비 완료 ({} 청크)", engine.index().len());

    let model = OpenAiChatModel::new(&config.api, &config.agent)?;
    let tools = ToolRegistry::new().register(Arc::new(RetrievalTool::new(
        engine,
        config.retrieval.default_k,
    )));
    let agent = AgentLoop::new(Arc::new(model), tools).with_config(&config.agent);
    let mut session = ChatSession::new(agent);

    println!("[OK] 세션 시작: {} (종료: exit / quit)", session.id());
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_command(input) {
            break;
        }

        match session.send(input).await {
            Ok(answer) => println!("Assistant: {}\n", answer),
            Err(_) => println!("Assistant: {}\n", APOLOGY),
        }
    }

    println!("[*] 세션 종료: {}", session.id());
    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// 인덱스 구축 명령어 (ingest)
async fn cmd_ingest(config: &Config, force: bool) -> Result<()> {
    let embedder = embedder(config)?;

    println!("[*] 문서 루트: {}", config.data_dir.display());
    let engine = RetrievalEngine::initialize(
        EngineOptions::from_config(config).force_rebuild(force),
        embedder,
    )
    .await
    .context("인덱스 구축 실패")?;

    match engine.origin() {
        IndexOrigin::Loaded => {
            println!(
                "[OK] 기존 인덱스를 로드했습니다 ({} 청크, {} 차원)",
                engine.index().len(),
                engine.index().dimension()
            );
            println!("     재구축: rag-agent ingest --force");
        }
        IndexOrigin::Built(report) => {
            println!("[OK] 인덱스 구축 완료");
            println!(
                "     발견된 문서: {} ({})",
                report.files_found,
                format_bytes(report.total_bytes as usize)
            );
            println!("     추출 성공: {}", report.files_extracted);
            if !report.skipped.is_empty() {
                println!("     건너뜀: {}", report.skipped.len());
                for path in &report.skipped {
                    println!("       - {}", path.display());
                }
            }
            println!(
                "     청크: {} ({} 차원)",
                report.chunks,
                engine.index().dimension()
            );
        }
    }
    println!("     인덱스: {}", engine.paths().index_path.display());

    Ok(())
}

/// 검색 명령어 (query)
async fn cmd_query(config: &Config, query: &str, k: usize) -> Result<()> {
    let embedder = embedder(config)?;
    let engine = RetrievalEngine::initialize(EngineOptions::from_config(config), embedder)
        .await
        .context("검색 엔진 초기화 실패")?;

    println!("[*] 검색 중: \"{}\"", query);

    let results = match engine.try_query(query, k).await {
        Ok(results) => results,
        Err(e) => bail!("검색 실패: {}", e),
    };

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [거리: {:.4}] {}",
            i + 1,
            result.distance,
            result.chunk.source
        );
        println!("   내용: {}", truncate_text(&result.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &Config) -> Result<()> {
    println!("rag-agent v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if config.data_dir.is_dir() {
        println!("[OK] 문서 루트: {}", config.data_dir.display());
    } else {
        println!("[!] 문서 루트 없음: {}", config.data_dir.display());
    }

    if config.require_api_key().is_ok() {
        println!("[OK] API 키: 설정됨 ({})", config.api.base_url);
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export OPENAI_API_KEY=your-key");
    }

    println!(
        "[*] 청킹: {} 문자 / 오버랩 {}",
        config.chunking.chunk_size, config.chunking.overlap
    );
    println!(
        "[*] 모델: {} (임베딩), {} (채팅)",
        config.embedding.model, config.agent.chat_model
    );

    let paths = IndexPaths::in_dir(&config.index_dir());
    if !paths.exist() {
        println!("[!] 인덱스 없음: {}", config.index_dir().display());
        println!("    구축: rag-agent ingest");
        return Ok(());
    }

    match FlatL2Index::load(&paths) {
        Ok(index) => {
            let size = std::fs::metadata(&paths.index_path)
                .map(|m| m.len() as usize)
                .unwrap_or(0);
            println!(
                "[OK] 벡터 인덱스: {} 청크, {} 차원 ({})",
                index.len(),
                index.dimension(),
                format_bytes(size)
            );
        }
        Err(e) => {
            println!("[!] 인덱스 로드 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_exit_commands() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(!is_exit_command("exit now"));
    }

    #[test]
    fn test_default_command_is_chat() {
        let cli = Cli::try_parse_from(["rag-agent"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "rag-agent",
            "--data-dir",
            "docs",
            "--chunk-size",
            "400",
            "chat",
            "--max-retries",
            "5",
            "--user",
            "Ana",
        ])
        .unwrap();

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.data_dir, PathBuf::from("docs"));
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.agent.max_retries, 5);
        assert_eq!(config.agent.user_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_query_command_args() {
        let cli = Cli::try_parse_from(["rag-agent", "query", "capital", "-k", "5"]).unwrap();
        match cli.command {
            Some(Commands::Query { query, k }) => {
                assert_eq!(query, "capital");
                assert_eq!(k, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
