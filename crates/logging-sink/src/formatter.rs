//! crates/logging-sink/src/formatter.rs
//!
//! Formatters turn a [`Record`] into the text a handler writes. The only
//! rendering offered is `%`-pattern substitution:
//!
//! | Conversion | Output |
//! |---|---|
//! | `%d` / `%d{pattern}` | timestamp (`yyyy-MM-dd HH:mm:ss,SSS` by default) |
//! | `%p` | level name |
//! | `%c`, `%c{N}`, `%c{N.}` | category, last N segments, or abbreviated segments |
//! | `%t` | thread name |
//! | `%s`, `%m` | message |
//! | `%e` | attached error, on its own line |
//! | `%i` | process id |
//! | `%n` | newline |
//! | `%%` | literal `%` |
//!
//! Each conversion accepts `-` (left justify), a minimum width and `.max`
//! (keep the trailing `max` characters), e.g. `%-5p`.

mod date;
mod pattern;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use date::{DEFAULT_DATE_PATTERN, DatePattern};
use pattern::{Colors, CompiledPattern};

use crate::record::Record;

/// Converts records into text.
pub trait Formatter: Send + Sync {
    /// Renders `record`.
    fn format(&self, record: &Record) -> String;
}

/// Shared formatter handle.
pub type SharedFormatter = Arc<dyn Formatter>;

/// Supplies banner text on demand.
pub type BannerSupplier = Arc<dyn Fn() -> String + Send + Sync>;

/// Formatter driven by a `%`-pattern, optionally with ANSI colors.
#[derive(Clone, Debug)]
pub struct PatternFormatter {
    pattern: String,
    compiled: CompiledPattern,
    colors: Colors,
}

impl PatternFormatter {
    /// Compiles a plain pattern formatter.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self {
            compiled: CompiledPattern::compile(&pattern),
            pattern,
            colors: Colors::default(),
        }
    }

    /// Compiles a formatter that colors the level and, when `darken` is
    /// non-zero, dims the category and thread columns.
    pub fn colored(pattern: impl Into<String>, darken: u8) -> Self {
        let mut formatter = Self::new(pattern);
        formatter.colors = Colors {
            enabled: true,
            darken,
        };
        formatter
    }

    /// Returns the source pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Reports whether ANSI colors are emitted.
    pub const fn is_colored(&self) -> bool {
        self.colors.enabled
    }
}

impl Formatter for PatternFormatter {
    fn format(&self, record: &Record) -> String {
        self.compiled.render(record, self.colors)
    }
}

/// Prefixes the first formatted record with banner text.
pub struct BannerFormatter {
    inner: SharedFormatter,
    banner: BannerSupplier,
    pending: AtomicBool,
}

impl BannerFormatter {
    /// Wraps `inner`; the banner is fetched lazily on first use.
    pub fn new(inner: SharedFormatter, banner: BannerSupplier) -> Self {
        Self {
            inner,
            banner,
            pending: AtomicBool::new(true),
        }
    }
}

impl Formatter for BannerFormatter {
    fn format(&self, record: &Record) -> String {
        let formatted = self.inner.format(record);
        if self.pending.swap(false, Ordering::AcqRel) {
            let mut banner = (self.banner)();
            if !banner.ends_with('\n') {
                banner.push('\n');
            }
            banner + &formatted
        } else {
            formatted
        }
    }
}

impl std::fmt::Debug for BannerFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BannerFormatter")
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;

    #[test]
    fn pattern_formatter_exposes_pattern() {
        let formatter = PatternFormatter::new("%p %s");
        assert_eq!(formatter.pattern(), "%p %s");
        assert!(!formatter.is_colored());
        let out = formatter.format(&Record::new(Level::Info, "a", "hi"));
        assert_eq!(out, "INFO hi");
    }

    #[test]
    fn banner_is_emitted_once() {
        let inner: SharedFormatter = Arc::new(PatternFormatter::new("%s%n"));
        let banner: BannerSupplier = Arc::new(|| "== app ==".to_owned());
        let formatter = BannerFormatter::new(inner, banner);

        let first = formatter.format(&Record::new(Level::Info, "a", "one"));
        let second = formatter.format(&Record::new(Level::Info, "a", "two"));

        assert_eq!(first, "== app ==\none\n");
        assert_eq!(second, "two\n");
    }
}
