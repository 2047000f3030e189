// Mon Feb 2 2026 - Alex

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::atomic::{AtomicBool, Ordering};

struct ColoredLogger {
    level: LevelFilter,
    use_color: AtomicBool,
}

impl ColoredLogger {
    fn new(level: LevelFilter) -> Self {
        Self {
            level,
            use_color: AtomicBool::new(true),
        }
    }

    fn format_level(&self, level: Level) -> ColoredString {
        match level {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".green().bold(),
            Level::Debug => "DEBUG".blue().bold(),
            Level::Trace => "TRACE".magenta().bold(),
        }
    }
}

impl Log for ColoredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level_str = if self.use_color.load(Ordering::Relaxed) {
                self.format_level(record.level()).to_string()
            } else {
                format!("{:5}", record.level())
            };

            let target = if !record.target().is_empty() {
                format!("[{}]", record.target())
            } else {
                String::new()
            };

            eprintln!("{} {} {}", level_str, target.dimmed(), record.args());
        }
    }

    fn flush(&self) {}
}

pub fn init_logger(level: LevelFilter) {
    let logger = Box::new(ColoredLogger::new(level));
    log::set_boxed_logger(logger).ok();
    log::set_max_level(level);
}

pub fn init_from_env() {
    env_logger::init();
}

pub fn level_from_str(s: &str) -> LevelFilter {
    match s.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

pub struct ScopedTimer {
    name: String,
    start: std::time::Instant,
}

impl ScopedTimer {
    pub fn new(name: &str) -> Self {
        log::debug!("[TIMER] {} started", name);
        Self {
            name: name.to_string(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        log::debug!("[TIMER] {} took {:.2}ms", self.name, elapsed.as_secs_f64() * 1000.0);
    }
}
