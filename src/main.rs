//! rag-agent CLI 진입점

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use rag_agent::cli::Cli;
use rag_agent::config::{Config, LogConfig};

fn main() -> Result<()> {
    // .env 파일 (없으면 무시)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("설정 로드 실패")?;
    cli.apply(&mut config);
    config.validate().context("설정 검증 실패")?;

    // 로깅 초기화 (guard는 종료 시까지 유지)
    let _guard = init_logging(&config.log)?;

    // CLI 실행
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(rag_agent::cli::run(cli, config))
}

fn init_logging(log: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&log.level)
            .with_context(|| format!("잘못된 로그 레벨: {}", log.level))?,
    }
    .add_directive("reqwest=warn".parse()?)
    .add_directive("hyper=warn".parse()?);

    let (file_layer, guard) = if log.to_file {
        std::fs::create_dir_all(&log.dir)
            .with_context(|| format!("로그 디렉토리 생성 실패: {}", log.dir.display()))?;
        let file_name = format!(
            "rag-agent_{}.log",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let appender = tracing_appender::rolling::never(&log.dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}
