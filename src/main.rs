//! Livemark - incremental live markdown preview.
//!
//! Patch operations and scroll requests are written to stdout as JSON
//! lines, for a preview surface to replay.
//!
//! # Usage
//!
//! ```bash
//! livemark README.md
//! livemark --watch README.md
//! livemark --listen --port 8090
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use livemark::config::{
    ConfigFlags, ThemeMode, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, parse_flag_tokens, save_config_flags,
};
use livemark::highlight::{HighlightBackground, set_background_mode};
use livemark::listener::{self, DEFAULT_PORT};
use livemark::perf;
use livemark::render::MarkdownRenderer;
use livemark::session::{JsonLinesPresenter, UpdateCoordinator};
use livemark::watcher::{DEFAULT_DEBOUNCE, FileSource, read_snapshot};

/// Incremental live markdown preview with cursor tracking
#[derive(Parser, Debug)]
#[command(name = "livemark", version, about, long_about = None)]
struct Cli {
    /// Markdown file to preview
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Watch FILE for changes and re-render
    #[arg(short, long)]
    watch: bool,

    /// Accept buffer changes from an editor over TCP
    #[arg(short, long)]
    listen: bool,

    /// Editor port to listen on
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Cursor line reported with file snapshots (1-based)
    #[arg(long, value_name = "LINE", value_parser = clap::value_parser!(u64).range(1..))]
    cursor_line: Option<u64>,

    /// Force syntax highlight theme background (light or dark)
    #[arg(long, value_enum, default_value = "auto")]
    theme: ThemeMode,

    /// Node-level steps between checks for a newer change
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    yield_every: Option<u64>,

    /// Render fenced code without syntax highlighting
    #[arg(long)]
    no_highlight: bool,

    /// Enable pipeline performance logging
    #[arg(long)]
    perf: bool,

    /// Write detailed pipeline debug events to a file
    #[arg(long, value_name = "PATH")]
    debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn main() -> Result<()> {
    // stdout carries the patch stream, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let debug_log_path = perf::debug_log_path(
        effective.debug_log.clone(),
        std::env::var_os(perf::DEBUG_LOG_ENV),
    );
    if let Err(err) = perf::set_debug_log_path(debug_log_path.as_deref()) {
        tracing::warn!(
            path = ?debug_log_path,
            error = %err,
            "failed to initialize debug log"
        );
    }

    match effective.theme.unwrap_or(ThemeMode::Auto) {
        ThemeMode::Auto => set_background_mode(None),
        ThemeMode::Light => set_background_mode(Some(HighlightBackground::Light)),
        ThemeMode::Dark => set_background_mode(Some(HighlightBackground::Dark)),
    }

    if cli.file.is_none() && !effective.listen {
        if cli.save || cli.clear {
            return Ok(());
        }
        anyhow::bail!("Nothing to preview: pass a FILE or --listen");
    }
    if effective.watch && cli.file.is_none() {
        anyhow::bail!("--watch needs a FILE");
    }

    let cursor_line = effective.cursor_line.unwrap_or(1);
    let renderer = MarkdownRenderer::new().with_highlighting(!effective.no_highlight);
    let presenter = JsonLinesPresenter::new(std::io::stdout());
    let mut coordinator = UpdateCoordinator::new(renderer, presenter)
        .with_yield_every(effective.yield_every.unwrap_or(livemark::cancel::DEFAULT_YIELD_EVERY));
    let sender = coordinator.handle();
    let shutdown = coordinator.shutdown_token();

    if let Some(file) = &cli.file {
        let snapshot = read_snapshot(file, cursor_line)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        sender.submit(snapshot)?;
    }

    if effective.watch
        && let Some(file) = &cli.file
    {
        let source = FileSource::new(file, DEFAULT_DEBOUNCE, cursor_line)
            .with_context(|| format!("Failed to watch {}", file.display()))?;
        source.spawn(sender.clone(), Duration::from_millis(50), shutdown.clone());
    }

    if effective.listen {
        let port = effective.port.unwrap_or(DEFAULT_PORT);
        listener::spawn(("127.0.0.1", port), sender.clone())
            .with_context(|| format!("Failed to listen on port {port}"))?;
    }

    if effective.watch || effective.listen {
        coordinator.run(Duration::from_millis(100));
        return Ok(());
    }

    for outcome in coordinator.run_pending() {
        outcome.context("Preview update failed")?;
    }
    Ok(())
}
