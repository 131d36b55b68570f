//! crates/logging-sink/src/formatter/pattern.rs
//! `%`-pattern compilation and rendering.

use super::date::DatePattern;
use crate::level::Level;
use crate::record::Record;

/// Width and truncation applied to a single conversion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Justify {
    left: bool,
    min: usize,
    max: Option<usize>,
}

impl Justify {
    fn apply(self, value: &str, out: &mut String) {
        let value = match self.max {
            Some(max) if value.chars().count() > max => {
                let skip = value.chars().count() - max;
                &value[value.char_indices().nth(skip).map_or(0, |(i, _)| i)..]
            }
            _ => value,
        };
        let len = value.chars().count();
        let pad = self.min.saturating_sub(len);
        if !self.left {
            out.extend(std::iter::repeat_n(' ', pad));
        }
        out.push_str(value);
        if self.left {
            out.extend(std::iter::repeat_n(' ', pad));
        }
    }
}

/// How `%c{...}` shortens a category name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Precision {
    /// `%c{N}`: keep the last N segments.
    Segments(usize),
    /// `%c{N.}`: shorten every segment except the last to N characters.
    Abbreviate(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Date(DatePattern),
    Level(Justify),
    Category(Justify, Option<Precision>),
    Thread(Justify),
    Message(Justify),
    Thrown,
    ProcessId(Justify),
    Newline,
}

/// Styling hooks used while rendering a compiled pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Colors {
    pub(crate) enabled: bool,
    pub(crate) darken: u8,
}

/// A pattern compiled into segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CompiledPattern {
    segments: Vec<Segment>,
}

impl CompiledPattern {
    pub(crate) fn compile(pattern: &str) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut index = 0;

        while index < chars.len() {
            if chars[index] != '%' {
                literal.push(chars[index]);
                index += 1;
                continue;
            }
            let start = index;
            index += 1;

            let mut justify = Justify::default();
            if chars.get(index) == Some(&'-') {
                justify.left = true;
                index += 1;
            }
            justify.min = read_number(&chars, &mut index).unwrap_or(0);
            if chars.get(index) == Some(&'.') {
                index += 1;
                justify.max = read_number(&chars, &mut index);
            }

            let Some(&conversion) = chars.get(index) else {
                literal.extend(&chars[start..]);
                break;
            };
            index += 1;
            let argument = read_argument(&chars, &mut index);

            let segment = match conversion {
                '%' => {
                    literal.push('%');
                    continue;
                }
                'd' => Segment::Date(
                    argument
                        .as_deref()
                        .map_or_else(DatePattern::default, DatePattern::parse),
                ),
                'p' => Segment::Level(justify),
                'c' => Segment::Category(justify, argument.as_deref().and_then(parse_precision)),
                't' => Segment::Thread(justify),
                's' | 'm' => Segment::Message(justify),
                'e' => Segment::Thrown,
                'i' => Segment::ProcessId(justify),
                'n' => Segment::Newline,
                _ => {
                    literal.extend(&chars[start..index]);
                    continue;
                }
            };
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    pub(crate) fn render(&self, record: &Record, colors: Colors) -> String {
        let mut out = String::with_capacity(record.message().len() + 64);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Date(pattern) => pattern.render_into(record.timestamp(), &mut out),
                Segment::Level(justify) => {
                    if colors.enabled {
                        out.push_str(level_color(record.level()));
                        justify.apply(record.level().as_str(), &mut out);
                        out.push_str(RESET);
                    } else {
                        justify.apply(record.level().as_str(), &mut out);
                    }
                }
                Segment::Category(justify, precision) => {
                    let name = shorten_category(record.category(), *precision);
                    dimmed(colors, &mut out, |out| justify.apply(&name, out));
                }
                Segment::Thread(justify) => {
                    dimmed(colors, &mut out, |out| justify.apply(record.thread(), out));
                }
                Segment::Message(justify) => justify.apply(record.message(), &mut out),
                Segment::Thrown => {
                    if let Some(thrown) = record.thrown() {
                        out.push('\n');
                        out.push_str(thrown);
                    }
                }
                Segment::ProcessId(justify) => {
                    justify.apply(&std::process::id().to_string(), &mut out);
                }
                Segment::Newline => out.push('\n'),
            }
        }
        out
    }
}

const RESET: &str = "\x1b[0m";

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Fatal | Level::Error => "\x1b[31m",
        Level::Warn => "\x1b[33m",
        Level::Info => "\x1b[34m",
        Level::Debug => "\x1b[36m",
        Level::Trace | Level::Off => "\x1b[37m",
    }
}

fn dimmed(colors: Colors, out: &mut String, render: impl FnOnce(&mut String)) {
    if colors.enabled && colors.darken > 0 {
        out.push_str("\x1b[2m");
        render(out);
        out.push_str(RESET);
    } else {
        render(out);
    }
}

fn read_number(chars: &[char], index: &mut usize) -> Option<usize> {
    let start = *index;
    while chars.get(*index).is_some_and(char::is_ascii_digit) {
        *index += 1;
    }
    if start == *index {
        return None;
    }
    chars[start..*index].iter().collect::<String>().parse().ok()
}

fn read_argument(chars: &[char], index: &mut usize) -> Option<String> {
    if chars.get(*index) != Some(&'{') {
        return None;
    }
    let close = chars[*index..].iter().position(|c| *c == '}')?;
    let argument = chars[*index + 1..*index + close].iter().collect();
    *index += close + 1;
    Some(argument)
}

fn parse_precision(argument: &str) -> Option<Precision> {
    match argument.strip_suffix('.') {
        Some(width) => width.parse().ok().map(Precision::Abbreviate),
        None => argument.parse().ok().map(Precision::Segments),
    }
}

fn shorten_category(category: &str, precision: Option<Precision>) -> String {
    match precision {
        None => category.to_owned(),
        Some(Precision::Segments(count)) => {
            let parts: Vec<&str> = category.split('.').collect();
            let keep = count.max(1).min(parts.len());
            parts[parts.len() - keep..].join(".")
        }
        Some(Precision::Abbreviate(width)) => {
            let mut parts: Vec<String> = category.split('.').map(str::to_owned).collect();
            let last = parts.len().saturating_sub(1);
            for part in &mut parts[..last] {
                *part = part.chars().take(width.max(1)).collect();
            }
            parts.join(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record() -> Record {
        Record::new(Level::Warn, "io.quarkus.runtime.Application", "started")
            .with_thread("main")
            .with_timestamp(datetime!(2024-05-01 12:30:45.123 UTC))
    }

    fn render(pattern: &str, record: &Record) -> String {
        CompiledPattern::compile(pattern).render(record, Colors::default())
    }

    #[test]
    fn renders_common_conversions() {
        let out = render("%d{HH:mm:ss,SSS} %-5p [%c{3.}] (%t) %s%e%n", &record());
        assert_eq!(out, "12:30:45,123 WARN  [io.qua.run.Application] (main) started\n");
    }

    #[test]
    fn segment_precision_keeps_tail() {
        assert_eq!(render("%c{2}", &record()), "runtime.Application");
        assert_eq!(render("%c{1.}", &record()), "i.q.r.Application");
    }

    #[test]
    fn right_justify_and_truncate() {
        assert_eq!(render("[%6p]", &record()), "[  WARN]");
        assert_eq!(render("[%.3c]", &record()), "[ion]");
    }

    #[test]
    fn thrown_is_rendered_on_new_line() {
        let record = record().with_thrown("boom");
        assert_eq!(render("%s%e", &record), "started\nboom");
    }

    #[test]
    fn percent_escape_and_unknown_conversions_are_literal() {
        assert_eq!(render("100%% %q", &record()), "100% %q");
        assert_eq!(render("trailing %", &record()), "trailing %");
    }

    #[test]
    fn colors_wrap_level() {
        let compiled = CompiledPattern::compile("%p");
        let out = compiled.render(
            &record(),
            Colors {
                enabled: true,
                darken: 0,
            },
        );
        assert_eq!(out, "\x1b[33mWARN\x1b[0m");
    }
}
