//! Shared command line plumbing for the simulator binaries: argument styles,
//! verbosity flags and logging setup.

use std::{fs::File, sync::Mutex};

pub use clap;

pub mod verbose {
    pub use clap_verbosity_flag::{Level, Verbosity};
}

use clap::builder::styling::{AnsiColor, Effects, Styles};

/// Terminal styles used by every `--help` page.
pub fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .invalid(AnsiColor::Yellow.on_default() | Effects::BOLD)
}

/// Map the `-v` count onto a tracing level. Without any flag only errors
/// are shown.
pub fn verbose_level_to_trace(level: Option<verbose::Level>) -> &'static tracing::Level {
    match level {
        Some(verbose::Level::Error) => &tracing::Level::WARN,
        Some(verbose::Level::Warn) => &tracing::Level::INFO,
        Some(verbose::Level::Info) => &tracing::Level::DEBUG,
        Some(verbose::Level::Debug) => &tracing::Level::TRACE,
        Some(verbose::Level::Trace) => &tracing::Level::TRACE,
        None => &tracing::Level::ERROR,
    }
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr as plain text, or to `log_file` as JSON lines when a file
/// is given. Calling this twice keeps the first subscriber.
pub fn logging_setup(level: &tracing::Level, log_file: Option<File>) {
    let builder = tracing_subscriber::fmt()
        .with_max_level(*level)
        .with_target(false);
    let r = match log_file {
        Some(file) => builder.json().with_writer(Mutex::new(file)).try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    if let Err(e) = r {
        eprintln!("logging already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(verbose_level_to_trace(None), &tracing::Level::ERROR);
        assert_eq!(
            verbose_level_to_trace(Some(verbose::Level::Error)),
            &tracing::Level::WARN
        );
        assert_eq!(
            verbose_level_to_trace(Some(verbose::Level::Info)),
            &tracing::Level::DEBUG
        );
        assert_eq!(
            verbose_level_to_trace(Some(verbose::Level::Trace)),
            &tracing::Level::TRACE
        );
    }

    #[test]
    fn test_json_log_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        logging_setup(&tracing::Level::INFO, Some(file.reopen().unwrap()));
        tracing::warn!("hello from the log test");
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("hello from the log test"));
    }
}
