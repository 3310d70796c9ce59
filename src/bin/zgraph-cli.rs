//! CLI zgraph
//!
//! Кодирует JSON в бинарный формат, декодирует обратно (в том числе
//! кусками заданного размера, чтобы прогнать пошаговый парсер) и печатает
//! поток тегов с позициями и id.

use std::{io::Write, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;
use zgraph::{
    codec::{CollectHandler, ParseEvent},
    config::Settings,
    json,
    logging::{init_logging, LoggingConfig},
    Codec, DeserializeOptions, Endian, StackError,
};

/// Основная структура CLI аргументов
#[derive(Parser)]
#[command(name = "zgraph-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
))]
#[command(about = "zgraph CLI - encode, decode and inspect zgraph streams", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Файл конфигурации (по умолчанию `zgraph.toml`, если есть)
    #[arg(long, env = "ZGRAPH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Включить подробный вывод (debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Подавить логирование
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Печатать ошибку одной JSON-строкой (`code`, `message`)
    #[arg(long, global = true)]
    json_errors: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Подкоманды CLI
#[derive(Subcommand)]
enum Commands {
    /// JSON → zgraph
    #[command(alias = "e")]
    Encode {
        /// Входной JSON (по умолчанию stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Выходной файл (по умолчанию stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Порядок байт typed-массивов: little, big, native
        #[arg(long)]
        endian: Option<Endian>,
    },
    /// zgraph → JSON
    #[command(alias = "d")]
    Decode {
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Подавать байты парсеру кусками такого размера
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Предел длины входа в байтах
        #[arg(long)]
        max_length: Option<u64>,
        /// Однострочный JSON вместо многострочного
        #[arg(long)]
        compact: bool,
    },
    /// Печать потока тегов
    Inspect {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("Failed to load settings")?;

    let mut logging = settings.logging_config();
    if cli.verbose || cli.quiet {
        let overrides = LoggingConfig::for_cli(cli.verbose, cli.quiet);
        logging.level = overrides.level;
    }
    let handle = init_logging(logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {e}"))?;
    debug!(?settings, "settings loaded");

    let result = run(&cli, &settings).await;
    handle.shutdown();
    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            report_error(&err, cli.json_errors);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Ошибки кодека печатаются как `error[код]: сообщение`; подробности
/// (контексты, место вызова) только для критичных.
fn report_error(
    err: &anyhow::Error,
    json_errors: bool,
) {
    let Some(stack) = err.downcast_ref::<StackError>() else {
        eprintln!("Error: {err:#}");
        return;
    };
    let plain = format!(
        "error[{}]: {}",
        stack.status_code().code(),
        stack.client_message()
    );
    if json_errors {
        match serde_json::to_string(&stack.to_response()) {
            Ok(line) => eprintln!("{line}"),
            Err(_) => eprintln!("{plain}"),
        }
        return;
    }
    eprintln!("{plain}");
    if stack.is_critical() {
        eprintln!("{stack:?}");
    }
}

async fn run(
    cli: &Cli,
    settings: &Settings,
) -> Result<()> {
    match &cli.command {
        Commands::Encode {
            input,
            output,
            endian,
        } => {
            let doc = json::from_json_slice(&read_input(input.as_ref()).await?)?;
            let mut options = settings.serialize_options();
            if let Some(endian) = endian {
                options.endian = *endian;
            }
            let bytes = Codec::new()
                .with_serialize_options(options)
                .serialize(&doc.graph, &doc.root)?;
            write_output(output.as_ref(), &bytes).await
        }
        Commands::Decode {
            input,
            chunk_size,
            max_length,
            compact,
        } => {
            let bytes = read_input(input.as_ref()).await?;
            let options = DeserializeOptions {
                max_length: max_length.unwrap_or(settings.max_length),
            };
            let chunk = chunk_size.unwrap_or(settings.chunk_size).max(1);
            let doc = Codec::new()
                .with_deserialize_options(options)
                .deserializing(bytes.chunks(chunk))?;
            let value = json::to_json(&doc);
            let text = if *compact {
                serde_json::to_string(&value)?
            } else {
                serde_json::to_string_pretty(&value)?
            };
            println!("{text}");
            Ok(())
        }
        Commands::Inspect { input } => {
            let bytes = read_input(input.as_ref()).await?;
            let codec = Codec::new().with_deserialize_options(settings.deserialize_options());
            let mut session = codec.deserializable_with(CollectHandler::new())?;
            let fed = session.feed(&bytes);
            let (result, handler) = session.finish_with_handler();

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for event in handler.events() {
                writeln!(out, "{}", render_event(event))?;
            }
            fed?;
            result?;
            Ok(())
        }
    }
}

/// Одна строка вывода `inspect`.
fn render_event(event: &ParseEvent<'_>) -> String {
    match event {
        ParseEvent::Version { version } => format!("{:>8}  version {}", 0, *version as u8),
        ParseEvent::Item {
            offset,
            tag,
            id,
            depth,
        } => {
            let indent = "  ".repeat(*depth);
            match (tag, id) {
                (zgraph::WireTag::BackReference, Some(id)) => {
                    format!("{offset:>8}  {indent}-> #{id}")
                }
                (_, Some(id)) => format!("{offset:>8}  {indent}{tag:?} #{id}"),
                (_, None) => format!("{offset:>8}  {indent}{tag:?}"),
            }
        }
        ParseEvent::RawString {
            offset,
            value,
            depth,
        } => format!("{offset:>8}  {}{value:?}", "  ".repeat(*depth)),
        ParseEvent::End { bytes, nodes } => format!("end: {bytes} bytes, {nodes} nodes"),
    }
}

async fn read_input(path: Option<&PathBuf>) -> Result<Vec<u8>> {
    match path {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

async fn write_output(
    path: Option<&PathBuf>,
    bytes: &[u8],
) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(bytes).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
