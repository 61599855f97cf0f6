//! Kernel-style print macros for workpool
//!
//! Line-atomic stderr output with an optional flush after every line and a
//! global level filter. Lines emitted from a pool worker carry a `[w<N>]`
//! tag so interleaved output from several workers stays readable.
//!
//! # Environment Variables
//!
//! - `WP_FLUSH_EPRINT=1` - Flush stderr after each line (useful when a test hangs)
//! - `WP_LOG_LEVEL=<level>` - off|error|warn|info|debug|trace, or 0..5
//!
//! # Usage
//!
//! ```ignore
//! use workpool_core::{kinfo, kdebug, kwarn};
//!
//! kinfo!("pool started with {} workers", n);
//! kdebug!("task {} dequeued", id);
//! kwarn!("done-callback panicked");
//! ```

use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log levels, most severe first
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name or digit; `None` for anything else
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "1" => Some(LogLevel::Error),
            "warn" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// Index of the pool worker running on this thread
    static WORKER_TAG: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Read `WP_LOG_LEVEL` / `WP_FLUSH_EPRINT`
///
/// Runs once; the first log line triggers it if nobody called it earlier.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    if crate::env::env_get_bool("WP_FLUSH_EPRINT", false) {
        FLUSH_ENABLED.store(true, Ordering::Relaxed);
    }

    if let Some(level) = crate::env::env_get_opt::<String>("WP_LOG_LEVEL")
        .as_deref()
        .and_then(LogLevel::parse)
    {
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
fn ensure_init() {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
}

#[inline]
pub fn flush_enabled() -> bool {
    ensure_init();
    FLUSH_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn log_level() -> LogLevel {
    ensure_init();
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Override the level (wins over the environment)
pub fn set_log_level(level: LogLevel) {
    INITIALIZED.store(true, Ordering::SeqCst);
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn set_flush_enabled(enabled: bool) {
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level <= log_level()
}

/// Tag this thread's log lines with a worker index
pub fn set_worker_tag(index: usize) {
    WORKER_TAG.with(|t| t.set(Some(index)));
}

pub fn clear_worker_tag() {
    WORKER_TAG.with(|t| t.set(None));
}

/// Worker index tagged on this thread, if any
pub fn worker_tag() -> Option<usize> {
    WORKER_TAG.with(|t| t.get())
}

fn finish_line(handle: &mut std::io::StderrLock<'_>) {
    let _ = handle.write_all(b"\n");
    if flush_enabled() {
        let _ = handle.flush();
    }
}

#[doc(hidden)]
pub fn _kprintln_impl(args: std::fmt::Arguments<'_>) {
    let mut handle = std::io::stderr().lock();
    let _ = handle.write_fmt(args);
    finish_line(&mut handle);
}

#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let mut handle = std::io::stderr().lock();
    let _ = match worker_tag() {
        Some(w) => write!(handle, "{} [w{}] ", level.tag(), w),
        None => write!(handle, "{} ", level.tag()),
    };
    let _ = handle.write_fmt(args);
    finish_line(&mut handle);
}

/// Print a line to stderr, unfiltered
#[macro_export]
macro_rules! kprintln {
    () => {{
        $crate::kprint::_kprintln_impl(format_args!(""));
    }};
    ($($arg:tt)*) => {{
        $crate::kprint::_kprintln_impl(format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Error, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Warn, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Info, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Debug, format_args!($($arg)*));
    }};
}

/// Most verbose level: per-task events
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::Trace, format_args!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
        assert_eq!(LogLevel::from_u8(99), LogLevel::Trace);
    }

    #[test]
    fn test_parse() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" warn "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("0"), Some(LogLevel::Off));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_worker_tag_is_per_thread() {
        set_worker_tag(3);
        assert_eq!(worker_tag(), Some(3));
        let other = std::thread::spawn(worker_tag).join().unwrap();
        assert_eq!(other, None);
        clear_worker_tag();
        assert_eq!(worker_tag(), None);
    }

    #[test]
    fn test_macros_compile() {
        kprintln!();
        kerror!("error {}", "msg");
        kwarn!("warn");
        kinfo!("info {}", 1);
        kdebug!("debug");
        ktrace!("trace");
    }
}
