//! crates/logging-sink/src/console.rs
//! Handler writing to standard output or standard error.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use is_terminal::IsTerminal;

use crate::error_manager::ErrorCode;
use crate::formatter::SharedFormatter;
use crate::handler::{Handler, HandlerCore};
use crate::record::Record;

/// Stream a console handler writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConsoleTarget {
    /// Standard output.
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

impl ConsoleTarget {
    /// Reports whether the stream is attached to a terminal.
    pub fn is_terminal(self) -> bool {
        match self {
            Self::Stdout => io::stdout().is_terminal(),
            Self::Stderr => io::stderr().is_terminal(),
        }
    }
}

/// When console output is colored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ColorMode {
    /// Color when the target stream is a terminal.
    #[default]
    Auto,
    /// Always emit ANSI sequences.
    Always,
    /// Never emit ANSI sequences.
    Never,
}

impl ColorMode {
    /// Decides whether output to `target` should be colored.
    pub fn enabled_for(self, target: ConsoleTarget) -> bool {
        match self {
            Self::Auto => target.is_terminal(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" | "true" => Ok(Self::Always),
            "never" | "false" => Ok(Self::Never),
            other => Err(format!("unknown color mode '{other}'")),
        }
    }
}

/// Writes formatted records to a console stream.
pub struct ConsoleHandler {
    core: HandlerCore,
    target: ConsoleTarget,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleHandler {
    /// Creates a handler for `target`.
    pub fn new(target: ConsoleTarget, formatter: SharedFormatter) -> Self {
        let writer: Box<dyn Write + Send> = match target {
            ConsoleTarget::Stdout => Box::new(io::stdout()),
            ConsoleTarget::Stderr => Box::new(io::stderr()),
        };
        Self {
            core: HandlerCore::new(formatter),
            target,
            writer: Mutex::new(writer),
        }
    }

    /// Creates a handler writing to an arbitrary writer.
    pub fn with_writer(writer: Box<dyn Write + Send>, formatter: SharedFormatter) -> Self {
        Self {
            core: HandlerCore::new(formatter),
            target: ConsoleTarget::Stdout,
            writer: Mutex::new(writer),
        }
    }

    /// Returns the configured stream.
    pub const fn target(&self) -> ConsoleTarget {
        self.target
    }
}

impl Handler for ConsoleHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn publish(&self, record: &Record) {
        if !self.core.is_loggable(record) {
            return;
        }
        let text = self.core.format(record);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = writer.write_all(text.as_bytes()) {
            self.core
                .report("Failed to write console record", Some(&error), ErrorCode::Write);
        }
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = writer.flush() {
            self.core
                .report("Failed to flush console", Some(&error), ErrorCode::Flush);
        }
    }

    fn close(&self) {
        if self.core.mark_closed() {
            self.flush();
        }
    }

    fn kind(&self) -> &'static str {
        "console"
    }
}

impl fmt::Debug for ConsoleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleHandler")
            .field("target", &self.target)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::formatter::PatternFormatter;
    use crate::level::Level;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_formatted_records() {
        let buffer = Shared::default();
        let handler = ConsoleHandler::with_writer(
            Box::new(buffer.clone()),
            Arc::new(PatternFormatter::new("%p %c %s%n")),
        );
        handler.set_level(Level::Info);

        handler.publish(&Record::new(Level::Debug, "io.app", "hidden"));
        handler.publish(&Record::new(Level::Warn, "io.app", "shown"));
        handler.close();
        handler.publish(&Record::new(Level::Error, "io.app", "after close"));

        let out = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(out, "WARN io.app shown\n");
    }

    #[test]
    fn color_mode_parses_and_resolves() {
        assert_eq!("AUTO".parse::<ColorMode>(), Ok(ColorMode::Auto));
        assert_eq!("false".parse::<ColorMode>(), Ok(ColorMode::Never));
        assert!("rainbow".parse::<ColorMode>().is_err());
        assert!(ColorMode::Always.enabled_for(ConsoleTarget::Stdout));
        assert!(!ColorMode::Never.enabled_for(ConsoleTarget::Stderr));
    }
}
