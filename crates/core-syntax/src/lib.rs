//! Syntactic state machine: classifies bytes of a source line into `code`
//! or one of `{line-comment, block-comment, string, raw-string}` given a
//! language profile selected by file extension. Built to be fed one line at
//! a time by the harvester, carrying any still-open rule (an unterminated
//! block comment or string) across line boundaries.

use std::fmt;
use std::ops::Range;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported file extension: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Code,
    LineComment,
    BlockComment,
    String,
    RawString,
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentKind::Code => "code",
            SegmentKind::LineComment => "line-comment",
            SegmentKind::BlockComment => "block-comment",
            SegmentKind::String => "string",
            SegmentKind::RawString => "raw-string",
        };
        write!(f, "{s}")
    }
}

/// One recognized comment/string form: a start pattern, an end pattern, and
/// an optional escape byte that lets the end pattern appear literally inside
/// the segment (never honored inside a `RawString`, even if set here).
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub kind: SegmentKind,
    pub start: &'static str,
    pub end: &'static str,
    pub escape: Option<u8>,
}

const fn rule(kind: SegmentKind, start: &'static str, end: &'static str, escape: Option<u8>) -> Rule {
    Rule { kind, start, end, escape }
}

macro_rules! profile_table {
    ($($ext:literal)|+ => $rules:expr, rust_raw = $raw:expr;) => {
        LanguageProfile { extensions: &[$($ext),+], rules: $rules, rust_raw_strings: $raw }
    };
}

pub struct LanguageProfile {
    pub extensions: &'static [&'static str],
    pub rules: &'static [Rule],
    /// `.rs`-style `r"..."`, `r#"..."#`, `r##"..."##` with a dynamic hash
    /// count, handled outside the static `rules` table.
    pub rust_raw_strings: bool,
}

const C_FAMILY: &[Rule] = &[
    rule(SegmentKind::LineComment, "//", "\n", None),
    rule(SegmentKind::BlockComment, "/*", "*/", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
    rule(SegmentKind::RawString, "R\"(", ")\"", None),
];

const DOTNET_FAMILY: &[Rule] = &[
    rule(SegmentKind::LineComment, "//", "\n", None),
    rule(SegmentKind::BlockComment, "/*", "*/", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
    rule(SegmentKind::RawString, "\"\"\"", "\"\"\"", None),
];

const JAVA: &[Rule] = &[
    rule(SegmentKind::LineComment, "//", "\n", None),
    rule(SegmentKind::BlockComment, "/*", "*/", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
];

const JS_FAMILY: &[Rule] = &[
    rule(SegmentKind::LineComment, "//", "\n", None),
    rule(SegmentKind::BlockComment, "{/*", "*/}", None),
    rule(SegmentKind::BlockComment, "/*", "*/", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
    rule(SegmentKind::String, "'", "'", Some(b'\\')),
    rule(SegmentKind::RawString, "`", "`", None),
];

const GO: &[Rule] = &[
    rule(SegmentKind::LineComment, "//", "\n", None),
    rule(SegmentKind::BlockComment, "/*", "*/", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
    rule(SegmentKind::RawString, "`", "`", None),
];

const RUST_RULES: &[Rule] = &[
    rule(SegmentKind::LineComment, "//", "\n", None),
    rule(SegmentKind::BlockComment, "/*", "*/", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
];

const MARKUP: &[Rule] = &[
    rule(SegmentKind::BlockComment, "<!--", "-->", None),
    rule(SegmentKind::String, "\"", "\"", None),
];

const CSS: &[Rule] = &[
    rule(SegmentKind::BlockComment, "/*", "*/", None),
    rule(SegmentKind::String, "\"", "\"", None),
];

const PYTHON: &[Rule] = &[
    rule(SegmentKind::LineComment, "#", "\n", None),
    rule(SegmentKind::BlockComment, "\"\"\"", "\"\"\"", None),
    rule(SegmentKind::String, "\"", "\"", None),
];

const SQL: &[Rule] = &[
    rule(SegmentKind::LineComment, "--", "\n", None),
    rule(SegmentKind::BlockComment, "/*", "*/", None),
    rule(SegmentKind::String, "\"", "\"", None),
];

const PHP: &[Rule] = &[
    rule(SegmentKind::LineComment, "//", "\n", None),
    rule(SegmentKind::LineComment, "#", "\n", None),
    rule(SegmentKind::BlockComment, "/*", "*/", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
    rule(SegmentKind::String, "'", "'", Some(b'\\')),
];

const LUA: &[Rule] = &[
    rule(SegmentKind::LineComment, "--", "\n", None),
    rule(SegmentKind::BlockComment, "--[[", "]]", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
    rule(SegmentKind::String, "'", "'", Some(b'\\')),
    rule(SegmentKind::RawString, "[[", "]]", None),
];

const RUBY: &[Rule] = &[
    rule(SegmentKind::LineComment, "#", "\n", None),
    rule(SegmentKind::BlockComment, "=begin", "=end", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
    rule(SegmentKind::String, "'", "'", Some(b'\\')),
];

const JSON_RULES: &[Rule] = &[rule(SegmentKind::String, "\"", "\"", None)];

const SHELL: &[Rule] = &[
    rule(SegmentKind::LineComment, "#", "\n", None),
    rule(SegmentKind::String, "\"", "\"", Some(b'\\')),
    rule(SegmentKind::String, "'", "'", None),
];

static PROFILES: &[LanguageProfile] = &[
    profile_table!("c" | "cc" | "cpp" | "cxx" | "h" | "hpp" | "hxx" | "ipp" => C_FAMILY, rust_raw = false;),
    profile_table!("cs" | "fs" | "kt" | "swift" => DOTNET_FAMILY, rust_raw = false;),
    profile_table!("java" => JAVA, rust_raw = false;),
    profile_table!("js" | "ts" | "jsx" | "tsx" => JS_FAMILY, rust_raw = false;),
    profile_table!("go" => GO, rust_raw = false;),
    profile_table!("rs" => RUST_RULES, rust_raw = true;),
    profile_table!("html" | "htm" | "xml" => MARKUP, rust_raw = false;),
    profile_table!("css" => CSS, rust_raw = false;),
    profile_table!("py" => PYTHON, rust_raw = false;),
    profile_table!("sql" => SQL, rust_raw = false;),
    profile_table!("php" => PHP, rust_raw = false;),
    profile_table!("lua" => LUA, rust_raw = false;),
    profile_table!("rb" => RUBY, rust_raw = false;),
    profile_table!("json" => JSON_RULES, rust_raw = false;),
    profile_table!("sh" | "bash" => SHELL, rust_raw = false;),
];

pub fn profile_for_extension(ext: &str) -> Result<&'static LanguageProfile, Error> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    PROFILES
        .iter()
        .find(|p| p.extensions.contains(&ext.as_str()))
        .ok_or(Error::Unsupported(ext))
}

#[derive(Debug, Clone)]
struct Active {
    kind: SegmentKind,
    end: String,
    escape: Option<u8>,
    raw: bool,
}

/// Carries state across lines for a single file being scanned.
pub struct Scanner<'p> {
    profile: &'p LanguageProfile,
    sorted_rules: Vec<&'p Rule>,
    active: Option<Active>,
}

impl<'p> Scanner<'p> {
    pub fn new(profile: &'p LanguageProfile) -> Self {
        let mut sorted: Vec<&Rule> = profile.rules.iter().collect();
        sorted.sort_by(|a, b| b.start.len().cmp(&a.start.len()));
        Self {
            profile,
            sorted_rules: sorted,
            active: None,
        }
    }

    /// True if an unterminated rule (block comment, multi-line string) is
    /// still open entering the next line.
    pub fn in_open_segment(&self) -> bool {
        self.active.is_some()
    }

    fn try_match_start(&self, bytes: &[u8]) -> Option<(SegmentKind, usize, String, Option<u8>)> {
        if self.profile.rust_raw_strings {
            if let Some((len, end)) = match_rust_raw_start(bytes) {
                return Some((SegmentKind::RawString, len, end, None));
            }
        }
        for r in &self.sorted_rules {
            if bytes.starts_with(r.start.as_bytes()) {
                return Some((r.kind, r.start.len(), r.end.to_string(), r.escape));
            }
        }
        None
    }

    /// Classifies one line (without requiring a trailing terminator),
    /// returning byte-range spans covering the whole line in order.
    pub fn classify_line(&mut self, line: &[u8]) -> Vec<(SegmentKind, Range<usize>)> {
        let mut spans = Vec::new();
        let mut seg_start = 0usize;
        let mut i = 0usize;
        let mut cur_kind = self.active.as_ref().map(|a| a.kind).unwrap_or(SegmentKind::Code);

        while i < line.len() {
            if let Some(active) = self.active.clone() {
                if !active.raw {
                    if let Some(esc) = active.escape {
                        if line[i] == esc && i + 1 < line.len() {
                            i += 2;
                            continue;
                        }
                    }
                }
                if line[i..].starts_with(active.end.as_bytes()) {
                    i += active.end.len();
                    spans.push((cur_kind, seg_start..i));
                    seg_start = i;
                    self.active = None;
                    cur_kind = SegmentKind::Code;
                    continue;
                }
                i += 1;
                continue;
            }

            if let Some((kind, matched_len, end_pattern, escape)) = self.try_match_start(&line[i..]) {
                if kind == SegmentKind::LineComment {
                    let mut comment_start = i;
                    while comment_start > seg_start && line[comment_start - 1].is_ascii_whitespace() {
                        comment_start -= 1;
                    }
                    if comment_start > seg_start {
                        spans.push((SegmentKind::Code, seg_start..comment_start));
                    }
                    spans.push((SegmentKind::LineComment, comment_start..line.len()));
                    return spans;
                }
                if i > seg_start {
                    spans.push((SegmentKind::Code, seg_start..i));
                }
                self.active = Some(Active {
                    kind,
                    end: end_pattern,
                    escape,
                    raw: kind == SegmentKind::RawString,
                });
                cur_kind = kind;
                seg_start = i;
                i += matched_len;
            } else {
                i += 1;
            }
        }

        if seg_start < line.len() {
            spans.push((cur_kind, seg_start..line.len()));
        }
        spans
    }
}

fn match_rust_raw_start(bytes: &[u8]) -> Option<(usize, String)> {
    if !(bytes.first() == Some(&b'r') || bytes.first() == Some(&b'R')) {
        return None;
    }
    let mut idx = 1;
    let mut hashes = 0usize;
    while bytes.get(idx) == Some(&b'#') {
        hashes += 1;
        idx += 1;
    }
    if bytes.get(idx) == Some(&b'"') {
        idx += 1;
        let end = format!("\"{}", "#".repeat(hashes));
        Some((idx, end))
    } else {
        None
    }
}

/// Pure helper: finds the first rule start in `line`, returning the rule's
/// index in `rules` and a pointer to the first non-code byte. `None` for the
/// rule index means nothing matched; the pointer then points at the first
/// non-whitespace byte (used to strip leading indentation in ignore-file
/// parsing).
pub fn find_first(line: &[u8], rules: &[Rule]) -> (Option<usize>, usize) {
    let mut sorted: Vec<(usize, &Rule)> = rules.iter().enumerate().collect();
    sorted.sort_by(|a, b| b.1.start.len().cmp(&a.1.start.len()));

    for start in 0..line.len() {
        for (idx, r) in &sorted {
            if line[start..].starts_with(r.start.as_bytes()) {
                return (Some(*idx), start);
            }
        }
    }
    let first_non_space = line.iter().position(|&b| !b.is_ascii_whitespace()).unwrap_or(line.len());
    (None, first_non_space)
}

/// Pure helper: the substring of `line` bounded by the first matching rule,
/// from its start pattern through its end pattern (or end of line if
/// unterminated).
pub fn read_first<'a>(line: &'a [u8], rules: &[Rule]) -> (Option<usize>, &'a [u8]) {
    let (idx, pos) = find_first(line, rules);
    let Some(idx) = idx else {
        return (None, &line[pos..pos]);
    };
    let r = &rules[idx];
    let rest = &line[pos + r.start.len()..];
    let end_pos = rest
        .windows(r.end.len().max(1))
        .position(|w| w == r.end.as_bytes())
        .map(|p| pos + r.start.len() + p + r.end.len())
        .unwrap_or(line.len());
    (Some(idx), &line[pos..end_pos])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_errors() {
        assert!(profile_for_extension("zzz").is_err());
    }

    #[test]
    fn cpp_line_classifies_comment_code_and_line_comment() {
        let profile = profile_for_extension("cpp").unwrap();
        let mut scanner = Scanner::new(profile);
        let line = b"/* hello */ code // tail";
        let spans = scanner.classify_line(line);
        assert_eq!(spans[0], (SegmentKind::BlockComment, 0..11));
        assert_eq!(spans[1].0, SegmentKind::Code);
        assert_eq!(spans[1].1.start, 11);
        assert_eq!(spans[1].1.end, 16);
        assert_eq!(spans.last().unwrap(), &(SegmentKind::LineComment, 16..line.len()));
    }

    #[test]
    fn block_comment_carries_across_lines() {
        let profile = profile_for_extension("c").unwrap();
        let mut scanner = Scanner::new(profile);
        let spans1 = scanner.classify_line(b"/* start of comment");
        assert_eq!(spans1[0].0, SegmentKind::BlockComment);
        assert!(scanner.in_open_segment());
        let spans2 = scanner.classify_line(b"still comment */ code()");
        assert_eq!(spans2[0].0, SegmentKind::BlockComment);
        assert!(!scanner.in_open_segment());
        assert_eq!(spans2[1].0, SegmentKind::Code);
    }

    #[test]
    fn rust_raw_string_hash_counted() {
        let profile = profile_for_extension("rs").unwrap();
        let mut scanner = Scanner::new(profile);
        let line: &[u8] = b"let s = r#\"has a \" inside\"#; code();";
        let spans = scanner.classify_line(line);
        assert_eq!(spans[0].0, SegmentKind::Code);
        assert!(spans.iter().any(|(k, _)| *k == SegmentKind::RawString));
        assert_eq!(spans.last().unwrap().0, SegmentKind::Code);
    }

    #[test]
    fn escaped_quote_stays_inside_string() {
        let profile = profile_for_extension("c").unwrap();
        let mut scanner = Scanner::new(profile);
        let spans = scanner.classify_line(br#""a\"b" code"#);
        assert_eq!(spans[0].0, SegmentKind::String);
        assert_eq!(spans[1].0, SegmentKind::Code);
    }

    #[test]
    fn find_first_returns_first_non_space_when_no_rule_matches() {
        let profile = profile_for_extension("py").unwrap();
        let (idx, pos) = find_first(b"    plain text", profile.rules);
        assert_eq!(idx, None);
        assert_eq!(pos, 4);
    }
}
