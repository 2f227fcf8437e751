//! SoundSentry CLI: a live level meter over the always-on capture worker.
//!
//! The worker thread owns the input device and the trigger/capture/gate
//! pipeline; this binary renders its event stream, redraws the meter line,
//! and re-reads the profile file so tuning changes apply while it runs.

mod display;

use anyhow::{anyhow, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use soundsentry::audio::Recorder;
use soundsentry::classify::FALLBACK_LABELS;
use soundsentry::config::{AppConfig, EngineConfig, SharedConfig};
use soundsentry::monitor::{start_monitor, MonitorEvent, MonitorHandle};
use soundsentry::sink::{FileSink, LogNotifier};
use soundsentry::terminal_restore::TerminalRestoreGuard;
use soundsentry::{init_logging, init_tracing, log_debug, log_file_path};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

/// Meter redraw cadence.
const METER_UPDATE_MS: u64 = 80;

/// How long each key poll blocks; keeps the loop responsive without spinning.
const KEY_POLL_MS: u64 = 40;

/// How often the profile file is checked for changes.
const PROFILE_POLL_MS: u64 = 1000;

fn main() -> Result<()> {
    let mut config = AppConfig::parse();

    if config.list_input_devices {
        return list_input_devices();
    }
    if config.list_labels {
        for label in FALLBACK_LABELS {
            println!("{label}");
        }
        return Ok(());
    }

    // Keep the raw flags around; profile re-reads start from them.
    let parsed = config.clone();
    config.validate()?;
    init_logging(&config);
    init_tracing(&config);
    log_debug("=== SoundSentry started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let shared = SharedConfig::new(config.engine_config());
    let sink = FileSink::create(&config.recordings_dir)?;
    println!(
        "SoundSentry {} (press q or Esc to stop)",
        env!("CARGO_PKG_VERSION")
    );
    println!("Recordings: {}", sink.dir().display());

    let mut handle = start_monitor(shared.clone(), None, Box::new(sink), Box::new(LogNotifier));

    let terminal_guard = TerminalRestoreGuard::new();
    terminal_guard.enable_raw_mode()?;
    let outcome = run_ui(&config, &parsed, &shared, &handle);

    handle.request_stop();
    let palette = display::palette(config.no_color);
    let mut stdout = io::stdout();
    loop {
        match handle.events.recv_timeout(Duration::from_secs(2)) {
            Ok(event) => {
                let stopped = matches!(event, MonitorEvent::Stopped(_));
                if let Some(line) = display::format_event(&event, &palette) {
                    let _ = print_line(&mut stdout, &line);
                }
                if stopped {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    if let Some(worker) = handle.handle.take() {
        let _ = worker.join();
    }
    terminal_guard.restore();
    log_debug("=== SoundSentry exiting ===");

    match outcome? {
        UiOutcome::UserQuit => Ok(()),
        UiOutcome::WorkerDied => Err(anyhow!(
            "monitor session failed; run with --logs and check {:?}",
            log_file_path()
        )),
    }
}

enum UiOutcome {
    UserQuit,
    WorkerDied,
}

fn run_ui(
    config: &AppConfig,
    parsed: &AppConfig,
    shared: &SharedConfig,
    handle: &MonitorHandle,
) -> Result<UiOutcome> {
    let palette = display::palette(config.no_color);
    let mut stdout = io::stdout();
    let mut recording = false;
    let mut last_meter: Option<Instant> = None;
    let mut profile_watch = ProfileWatch::new(config.profile.clone());

    loop {
        let mut worker_died = false;
        while let Ok(event) = handle.events.try_recv() {
            match &event {
                MonitorEvent::Triggered { .. } => recording = true,
                MonitorEvent::Saved { .. }
                | MonitorEvent::Rejected { .. }
                | MonitorEvent::DroppedEmpty
                | MonitorEvent::SinkFailed(_) => recording = false,
                MonitorEvent::Fatal(_) => worker_died = true,
                _ => {}
            }
            if let Some(line) = display::format_event(&event, &palette) {
                print_line(&mut stdout, &line)?;
                last_meter = None;
            }
        }
        if worker_died {
            return Ok(UiOutcome::WorkerDied);
        }

        let redraw_due = last_meter
            .map(|at| at.elapsed() >= Duration::from_millis(METER_UPDATE_MS))
            .unwrap_or(true);
        if redraw_due {
            let threshold_db = shared.snapshot().threshold_db;
            let line =
                display::format_meter(handle.meter.level_db(), threshold_db, recording, &palette);
            redraw_meter(&mut stdout, &line)?;
            last_meter = Some(Instant::now());
        }

        match profile_watch.poll(parsed) {
            Some(Ok(engine)) => {
                shared.update(engine);
                print_line(&mut stdout, &format!("{}profile reloaded{}", palette.info, palette.reset))?;
                last_meter = None;
            }
            Some(Err(err)) => {
                print_line(
                    &mut stdout,
                    &format!("{}profile reload failed{}: {err:#}", palette.error, palette.reset),
                )?;
                last_meter = None;
            }
            None => {}
        }

        if event::poll(Duration::from_millis(KEY_POLL_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && is_quit_key(&key) {
                    return Ok(UiOutcome::UserQuit);
                }
            }
        }
    }
}

fn is_quit_key(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

/// Print a line above the meter. The meter line is cleared first and redrawn
/// on the next tick.
fn print_line(stdout: &mut impl Write, line: &str) -> Result<()> {
    write!(stdout, "\r\x1b[2K{line}\r\n")?;
    stdout.flush()?;
    Ok(())
}

fn redraw_meter(stdout: &mut impl Write, line: &str) -> Result<()> {
    write!(stdout, "\r\x1b[2K{line}")?;
    stdout.flush()?;
    Ok(())
}

/// Watches the profile file's mtime and revalidates the full flag set when
/// it changes. A broken profile keeps the last good config.
struct ProfileWatch {
    path: Option<PathBuf>,
    last_seen: Option<SystemTime>,
    last_poll: Option<Instant>,
}

impl ProfileWatch {
    fn new(path: Option<PathBuf>) -> Self {
        let last_seen = path.as_ref().and_then(|p| modified_at(p));
        Self {
            path,
            last_seen,
            last_poll: None,
        }
    }

    fn poll(&mut self, parsed: &AppConfig) -> Option<Result<EngineConfig>> {
        self.path.as_ref()?;
        let due = self
            .last_poll
            .map(|at| at.elapsed() >= Duration::from_millis(PROFILE_POLL_MS))
            .unwrap_or(true);
        if !due {
            return None;
        }
        self.last_poll = Some(Instant::now());

        let path = self.path.as_ref()?;
        let modified = modified_at(path)?;
        if self.last_seen == Some(modified) {
            return None;
        }
        self.last_seen = Some(modified);
        log_debug(&format!("profile changed: {}", path.display()));

        let mut fresh = parsed.clone();
        match fresh.validate() {
            Ok(()) => Some(Ok(fresh.engine_config())),
            Err(err) => Some(Err(err)),
        }
    }
}

fn modified_at(path: &std::path::Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}

fn list_input_devices() -> Result<()> {
    // SOUNDSENTRY_TEST_DEVICES lets tests exercise this path without hardware.
    let devices = if let Ok(raw) = std::env::var("SOUNDSENTRY_TEST_DEVICES") {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        }
    } else {
        Recorder::list_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err}");
            Vec::new()
        })
    };

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}
