//! crates/logging-sink/src/formatter/date.rs
//! Date patterns in the `yyyy-MM-dd HH:mm:ss,SSS` style used by log formats
//! and rotation suffixes.

use std::fmt::Write as _;

use time::OffsetDateTime;

/// Default pattern used by `%d` when no explicit pattern is given.
pub const DEFAULT_DATE_PATTERN: &str = "yyyy-MM-dd HH:mm:ss,SSS";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Field {
    Year4,
    Year2,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millis,
    Literal(String),
}

/// A compiled date pattern.
///
/// Recognised fields are `yyyy`, `yy`, `MM`, `dd`, `HH`, `mm`, `ss` and `SSS`.
/// Text between single quotes is copied verbatim (`''` yields a quote); every
/// other character is a literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatePattern {
    fields: Vec<Field>,
}

impl DatePattern {
    /// Compiles `pattern`.
    pub fn parse(pattern: &str) -> Self {
        let chars: Vec<char> = pattern.chars().collect();
        let mut fields = Vec::new();
        let mut literal = String::new();
        let mut index = 0;

        while index < chars.len() {
            let ch = chars[index];
            if ch == '\'' {
                index += 1;
                if chars.get(index) == Some(&'\'') {
                    literal.push('\'');
                    index += 1;
                    continue;
                }
                while index < chars.len() && chars[index] != '\'' {
                    literal.push(chars[index]);
                    index += 1;
                }
                index += 1;
                continue;
            }

            let run = chars[index..].iter().take_while(|c| **c == ch).count();
            let field = match (ch, run) {
                ('y', 2) => Some(Field::Year2),
                ('y', _) => Some(Field::Year4),
                ('M', _) => Some(Field::Month),
                ('d', _) => Some(Field::Day),
                ('H', _) => Some(Field::Hour),
                ('m', _) => Some(Field::Minute),
                ('s', _) => Some(Field::Second),
                ('S', _) => Some(Field::Millis),
                _ => None,
            };
            match field {
                Some(field) => {
                    if !literal.is_empty() {
                        fields.push(Field::Literal(std::mem::take(&mut literal)));
                    }
                    fields.push(field);
                    index += run;
                }
                None => {
                    literal.push(ch);
                    index += 1;
                }
            }
        }
        if !literal.is_empty() {
            fields.push(Field::Literal(literal));
        }
        Self { fields }
    }

    /// Appends the rendering of `timestamp` to `out`.
    pub fn render_into(&self, timestamp: OffsetDateTime, out: &mut String) {
        for field in &self.fields {
            // Writing into a String cannot fail.
            let _ = match field {
                Field::Year4 => write!(out, "{:04}", timestamp.year()),
                Field::Year2 => write!(out, "{:02}", timestamp.year().rem_euclid(100)),
                Field::Month => write!(out, "{:02}", u8::from(timestamp.month())),
                Field::Day => write!(out, "{:02}", timestamp.day()),
                Field::Hour => write!(out, "{:02}", timestamp.hour()),
                Field::Minute => write!(out, "{:02}", timestamp.minute()),
                Field::Second => write!(out, "{:02}", timestamp.second()),
                Field::Millis => write!(out, "{:03}", timestamp.millisecond()),
                Field::Literal(text) => out.write_str(text),
            };
        }
    }

    /// Renders `timestamp` into a new string.
    pub fn render(&self, timestamp: OffsetDateTime) -> String {
        let mut out = String::new();
        self.render_into(timestamp, &mut out);
        out
    }
}

impl Default for DatePattern {
    fn default() -> Self {
        Self::parse(DEFAULT_DATE_PATTERN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn default_pattern_renders_millis() {
        let ts = datetime!(2024-03-09 07:05:02.045 UTC);
        assert_eq!(DatePattern::default().render(ts), "2024-03-09 07:05:02,045");
    }

    #[test]
    fn quoted_text_is_literal() {
        let ts = datetime!(2024-12-31 23:59:59 UTC);
        let pattern = DatePattern::parse("'day' dd 'of' MM, yy");
        assert_eq!(pattern.render(ts), "day 31 of 12, 24");
    }

    #[test]
    fn rotation_suffix_pattern() {
        let ts = datetime!(2023-01-02 10:00:00 UTC);
        assert_eq!(DatePattern::parse(".yyyy-MM-dd").render(ts), ".2023-01-02");
    }

    #[test]
    fn doubled_quote_yields_quote() {
        let ts = datetime!(2023-01-02 10:00:00 UTC);
        assert_eq!(DatePattern::parse("HH''mm").render(ts), "10'00");
    }
}
