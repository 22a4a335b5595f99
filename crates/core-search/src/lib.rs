//! Pattern/regex line extractor (spec component H, §4.7/§4.8): streams a
//! file line by line through a [`core_window::LineWindow`], classifies each
//! byte with a [`core_syntax::Scanner`], and emits rows for lines whose
//! matches satisfy the segment restriction, match-all rule, and result cap.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;

use core_syntax::{Scanner, SegmentKind};
use core_window::LineWindow;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error(transparent)]
    Syntax(#[from] core_syntax::Error),
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
    #[error("operation cancelled")]
    Cancelled,
}

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io { path: path.display().to_string(), source }
}

/// A single search pattern: a literal substring or a compiled regex. A
/// search can mix both kinds in one pass.
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(s: impl Into<String>) -> Self {
        Pattern::Literal(s.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, Error> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Byte ranges of every non-overlapping match in `line`.
    fn find_all(&self, line: &str) -> Vec<(usize, usize)> {
        match self {
            Pattern::Literal(needle) if needle.is_empty() => Vec::new(),
            Pattern::Literal(needle) => line.match_indices(needle.as_str()).map(|(s, m)| (s, s + m.len())).collect(),
            Pattern::Regex(re) => re.find_iter(line).map(|m| (m.start(), m.end())).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    All,
    Code,
    Comment,
    String,
}

impl Segment {
    fn admits(self, kind: SegmentKind) -> bool {
        match self {
            Segment::All => true,
            Segment::Code => kind == SegmentKind::Code,
            Segment::Comment => matches!(kind, SegmentKind::LineComment | SegmentKind::BlockComment),
            Segment::String => matches!(kind, SegmentKind::String | SegmentKind::RawString),
        }
    }
}

/// Extracts `count` lines starting `offset` lines relative to a match
/// (negative looks backward, positive forward) for the `context-text` field.
#[derive(Debug, Clone, Copy)]
pub struct ContextSpec {
    pub offset: isize,
    pub count: usize,
}

impl Default for ContextSpec {
    fn default() -> Self {
        Self { offset: 0, count: 0 }
    }
}

pub struct SearchOptions {
    pub patterns: Vec<Pattern>,
    pub segment: Segment,
    pub max_results: Option<usize>,
    pub match_all: bool,
    pub context: ContextSpec,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            segment: Segment::All,
            max_results: None,
            match_all: false,
            context: ContextSpec::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    pub file: PathBuf,
    pub line_number: usize,
    pub column: usize,
    pub pattern_index: usize,
    pub line_text: String,
    pub context_text: String,
}

/// Reads `path` one chunk at a time, checking `cancel` between chunks (spec
/// §5: "between chunks within a file"). A worker that sees cancellation
/// finishes assembling whatever line is already in the window buffer, then
/// stops — the lines read so far are returned rather than discarded.
fn read_lines(path: &Path, cancel: &AtomicBool) -> Result<Vec<String>, Error> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut window = LineWindow::new();
    let mut lines = Vec::new();
    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let dst = window.buffer();
        let n = file.read(dst).map_err(|e| io_err(path, e))?;
        if n == 0 {
            window.set_eof();
        } else {
            window.update(n);
        }
        while let Some(line) = window.getline() {
            lines.push(String::from_utf8_lossy(line).into_owned());
        }
        if window.eof() {
            break;
        }
    }
    Ok(lines)
}

/// Searches one file for every pattern in `options`, returning matching
/// rows in increasing `(line, column)` order, already reduced by segment
/// restriction, `match_all`, and `max_results`. A `cancel` flag already
/// tripped before the file is opened is `Error::Cancelled`; one tripped
/// mid-read yields whatever matches were found in the lines read so far.
pub fn search_file(path: impl AsRef<Path>, options: &SearchOptions, cancel: &AtomicBool) -> Result<Vec<MatchRow>, Error> {
    if cancel.load(Ordering::Relaxed) {
        return Err(Error::Cancelled);
    }
    let path = path.as_ref();
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let profile = core_syntax::profile_for_extension(extension)?;
    let mut scanner = Scanner::new(profile);

    let lines = read_lines(path, cancel)?;
    let mut line_spans = Vec::with_capacity(lines.len());
    for line in &lines {
        line_spans.push(scanner.classify_line(line.as_bytes()));
    }

    let mut candidates = Vec::new();
    for (line_index, line) in lines.iter().enumerate() {
        let spans = &line_spans[line_index];
        for (pattern_index, pattern) in options.patterns.iter().enumerate() {
            for (start, end) in pattern.find_all(line) {
                let kind = spans
                    .iter()
                    .find(|(_, range)| range.start <= start && end <= range.end)
                    .map(|(kind, _)| *kind)
                    .unwrap_or(SegmentKind::Code);
                if !options.segment.admits(kind) {
                    continue;
                }
                candidates.push((line_index, start, pattern_index));
            }
        }
    }

    let selected: Vec<(usize, usize, usize)> = if options.match_all && !options.patterns.is_empty() {
        let total = options.patterns.len();
        let mut by_line: std::collections::BTreeMap<usize, Vec<(usize, usize, usize)>> = std::collections::BTreeMap::new();
        for cand in candidates {
            by_line.entry(cand.0).or_default().push(cand);
        }
        by_line
            .into_values()
            .filter(|group| {
                let distinct: std::collections::HashSet<usize> = group.iter().map(|c| c.2).collect();
                distinct.len() >= total
            })
            .flatten()
            .collect()
    } else {
        candidates
    };

    let mut rows = Vec::new();
    for (line_index, column, pattern_index) in selected {
        let context_text = build_context(&lines, line_index, options.context);
        rows.push(MatchRow {
            file: path.to_path_buf(),
            line_number: line_index + 1,
            column,
            pattern_index,
            line_text: lines[line_index].clone(),
            context_text,
        });
        if let Some(max) = options.max_results {
            if rows.len() >= max {
                break;
            }
        }
    }
    rows.sort_by(|a, b| (a.line_number, a.column).cmp(&(b.line_number, b.column)));
    Ok(rows)
}

fn build_context(lines: &[String], line_index: usize, spec: ContextSpec) -> String {
    if spec.count == 0 {
        return String::new();
    }
    let start = (line_index as isize + spec.offset).max(0) as usize;
    let end = (start + spec.count).min(lines.len());
    if start >= lines.len() {
        return String::new();
    }
    lines[start..end].join("")
}
