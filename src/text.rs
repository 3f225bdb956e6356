//! Line-oriented queries over a configuration dump.
//!
//! A [`TextIndex`] owns the lines of one `show running-config` (or routing)
//! dump. Queries return a [`Text`] view that can be narrowed further with
//! [`Text::exclude`] and [`Text::include`].

use std::fs;
use std::ops::Index;
use std::path::Path;

use crate::error::Result;

/// Lines of one configuration dump
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    lines: Vec<String>,
}

impl TextIndex {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Load a dump from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Ok(Self::new(&text))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All lines, in file order
    pub fn lines(&self) -> Text<'_> {
        Text {
            lines: self.lines.iter().map(String::as_str).collect(),
        }
    }

    /// Lines equal to `pattern` once surrounding blanks are trimmed.
    pub fn exact(&self, pattern: &str) -> Text<'_> {
        self.filter(|line| trim_blank(line) == pattern)
    }

    /// Lines containing `pattern`.
    pub fn include(&self, pattern: &str) -> Text<'_> {
        self.filter(|line| line.contains(pattern))
    }

    /// Lines starting with `pattern`.
    pub fn prefix(&self, pattern: &str) -> Text<'_> {
        self.filter(|line| line.starts_with(pattern))
    }

    /// Header lines containing `pattern` together with their indented bodies.
    pub fn section(&self, pattern: &str) -> Text<'_> {
        self.collect_sections(|line| line.contains(pattern))
    }

    /// Like [`TextIndex::section`], but the trimmed header must equal `pattern`.
    pub fn section_exact(&self, pattern: &str) -> Text<'_> {
        self.collect_sections(|line| trim_blank(line) == pattern)
    }

    fn filter(&self, keep: impl Fn(&str) -> bool) -> Text<'_> {
        Text {
            lines: self
                .lines
                .iter()
                .map(String::as_str)
                .filter(|line| keep(line))
                .collect(),
        }
    }

    // A body line must be indented at least one space deeper than its header.
    // The first shallower line closes the section; a line that matches the
    // header pattern opens a new one.
    fn collect_sections(&self, is_header: impl Fn(&str) -> bool) -> Text<'_> {
        let mut lines = Vec::new();
        let mut body_indent: Option<usize> = None;

        for line in &self.lines {
            if is_header(line) {
                body_indent = Some(indentation(line) + 1);
                lines.push(line.as_str());
                continue;
            }
            if let Some(indent) = body_indent {
                if indentation(line) >= indent {
                    lines.push(line.as_str());
                } else {
                    body_indent = None;
                }
            }
        }

        Text { lines }
    }
}

fn trim_blank(line: &str) -> &str {
    line.trim_matches(|c| c == ' ' || c == '\t')
}

fn indentation(line: &str) -> usize {
    line.bytes().take_while(|&b| b == b' ').count()
}

/// Borrowed selection of lines from a [`TextIndex`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text<'a> {
    lines: Vec<&'a str>,
}

impl<'a> Text<'a> {
    /// Drop lines containing `pattern`.
    pub fn exclude(self, pattern: &str) -> Self {
        Self {
            lines: self
                .lines
                .into_iter()
                .filter(|line| !line.contains(pattern))
                .collect(),
        }
    }

    /// Keep only lines containing `pattern`.
    pub fn include(self, pattern: &str) -> Self {
        Self {
            lines: self
                .lines
                .into_iter()
                .filter(|line| line.contains(pattern))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&'a str> {
        self.lines.get(idx).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.lines.iter().copied()
    }
}

impl<'a> Index<usize> for Text<'a> {
    type Output = str;

    fn index(&self, idx: usize) -> &str {
        self.lines[idx]
    }
}

impl<'a> IntoIterator for Text<'a> {
    type Item = &'a str;
    type IntoIter = std::vec::IntoIter<&'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}
