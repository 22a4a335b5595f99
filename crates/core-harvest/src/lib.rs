//! Directory harvester (spec component G, §4.6): walks one or more source
//! paths, applies an ignore list and an optional glob filter, and produces a
//! result table of candidate files (component I).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("operation cancelled")]
    Cancelled,
}

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io { path: path.display().to_string(), source }
}

/// One row in the harvester's result table: a candidate file plus its size
/// and extension, ready for downstream pattern extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub path: PathBuf,
    pub size: u64,
    pub extension: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IgnoreKind {
    /// `name/` — folder matched at any depth.
    Folder,
    /// `/name` — folder matched only at the project root.
    RootFolder,
    /// pattern containing `*` or `?`.
    Wildcard,
}

#[derive(Debug, Clone)]
struct IgnoreRule {
    kind: IgnoreKind,
    pattern: String,
}

/// A parsed ignore file: `.gitignore`-style comment and folder/wildcard
/// rules, matched against paths relative to the harvester's project root.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses ignore-file text: `#` introduces a line comment, `name/` is a
    /// folder rule matched anywhere, `/name` is root-anchored, a bare `name`
    /// with no dot is also a folder rule matched anywhere, and anything
    /// containing `*` or `?` is a wildcard rule.
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        for raw_line in text.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.contains('*') || line.contains('?') {
                rules.push(IgnoreRule { kind: IgnoreKind::Wildcard, pattern: line.to_string() });
            } else if let Some(rest) = line.strip_prefix('/') {
                rules.push(IgnoreRule { kind: IgnoreKind::RootFolder, pattern: rest.trim_end_matches('/').to_string() });
            } else if let Some(rest) = line.strip_suffix('/') {
                rules.push(IgnoreRule { kind: IgnoreKind::Folder, pattern: rest.to_string() });
            } else if !line.contains('.') {
                rules.push(IgnoreRule { kind: IgnoreKind::Folder, pattern: line.to_string() });
            } else {
                rules.push(IgnoreRule { kind: IgnoreKind::Wildcard, pattern: line.to_string() });
            }
        }
        Self { rules }
    }

    /// Discovers an ignore file per §6.4: prefer `.gitignore` at `root`,
    /// otherwise the first file matching `*ignore*` in `root` (scanning at
    /// most 20 entries).
    pub fn discover(root: &Path) -> std::io::Result<Option<Self>> {
        let gitignore = root.join(".gitignore");
        if gitignore.is_file() {
            return Ok(Some(Self::parse(&fs::read_to_string(&gitignore)?)));
        }
        let mut scanned = 0usize;
        for entry in fs::read_dir(root)? {
            if scanned >= 20 {
                break;
            }
            scanned += 1;
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.contains("ignore") && entry.path().is_file() {
                return Ok(Some(Self::parse(&fs::read_to_string(entry.path())?)));
            }
        }
        Ok(None)
    }

    /// `rel_path` is a forward-slash-normalized path relative to the project
    /// root. Returns true if any rule matches.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        let segments: Vec<&str> = rel_path.split('/').filter(|s| !s.is_empty()).collect();
        for rule in &self.rules {
            match rule.kind {
                IgnoreKind::RootFolder => {
                    if segments.first() == Some(&rule.pattern.as_str()) {
                        return true;
                    }
                }
                IgnoreKind::Folder => {
                    if segments.iter().any(|s| *s == rule.pattern) {
                        return true;
                    }
                }
                IgnoreKind::Wildcard => {
                    if glob_match(&rule.pattern, rel_path) || segments.iter().any(|s| glob_match(&rule.pattern, s)) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Minimal `*`/`?` glob matcher; `*` matches any run (including empty), `?`
/// matches exactly one character.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    glob_match_inner(&pat, &txt)
}

fn glob_match_inner(pat: &[char], txt: &[char]) -> bool {
    match pat.first() {
        None => txt.is_empty(),
        Some('*') => glob_match_inner(&pat[1..], txt) || (!txt.is_empty() && glob_match_inner(pat, &txt[1..])),
        Some('?') => !txt.is_empty() && glob_match_inner(&pat[1..], &txt[1..]),
        Some(c) => txt.first() == Some(c) && glob_match_inner(&pat[1..], &txt[1..]),
    }
}

fn normalize_forward(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Configuration for one harvest pass.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Project root used to resolve root-anchored ignore rules and to build
    /// the relative paths ignore rules match against.
    pub root: PathBuf,
    /// `;`- or `,`-separated list of source paths already split by the
    /// caller into individual entries.
    pub sources: Vec<PathBuf>,
    /// Optional extension filter, e.g. `["rs", "toml"]`. Empty means no
    /// filtering by extension.
    pub filter_extensions: Vec<String>,
    /// Recursion depth; `None` means unbounded.
    pub depth: Option<usize>,
    pub ignore: IgnoreRules,
}

/// Splits a semicolon- or comma-separated path list into individual paths.
pub fn split_source_list(list: &str) -> Vec<PathBuf> {
    list.split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn matches_filter(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Walks every source path in `options`, applying the extension filter and
/// ignore rules, and returns the result table.
///
/// Checks `cancel` between files and between source entries (spec §5): a
/// flag already tripped before any work starts is `Error::Cancelled`; one
/// tripped mid-walk stops dispatching further files and returns the rows
/// already collected rather than an error, since partial results are
/// preserved.
pub fn harvest(options: &HarvestOptions, cancel: &AtomicBool) -> Result<Vec<ResultRow>, Error> {
    if cancel.load(Ordering::Relaxed) {
        return Err(Error::Cancelled);
    }
    let mut rows = Vec::new();
    'sources: for source in &options.sources {
        if cancel.load(Ordering::Relaxed) {
            break 'sources;
        }
        let absolute = if source.is_absolute() { source.clone() } else { options.root.join(source) };

        if absolute.is_file() {
            if matches_filter(&absolute, &options.filter_extensions) {
                push_row(&mut rows, &options.root, &absolute, &options.ignore)?;
            }
            continue;
        }

        let mut walker = WalkDir::new(&absolute);
        if let Some(depth) = options.depth {
            walker = walker.max_depth(depth);
        }
        for entry in walker.into_iter().filter_map(Result::ok) {
            if cancel.load(Ordering::Relaxed) {
                break 'sources;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !matches_filter(path, &options.filter_extensions) {
                continue;
            }
            push_row(&mut rows, &options.root, path, &options.ignore)?;
        }
    }
    Ok(rows)
}

fn push_row(rows: &mut Vec<ResultRow>, root: &Path, path: &Path, ignore: &IgnoreRules) -> Result<(), Error> {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    let relative_str = normalize_forward(&relative);
    if ignore.is_ignored(&relative_str) {
        return Ok(());
    }
    let metadata = fs::metadata(path).map_err(|e| io_err(path, e))?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_string();
    rows.push(ResultRow { path: path.to_path_buf(), size: metadata.len(), extension });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn splits_semicolon_and_comma_lists() {
        let out = split_source_list("src; ./lib,./tests");
        assert_eq!(out, vec![PathBuf::from("src"), PathBuf::from("./lib"), PathBuf::from("./tests")]);
    }

    #[test]
    fn glob_matches_star_and_question() {
        assert!(glob_match("*.rs", "main.rs"));
        assert!(glob_match("target/*", "target/debug"));
        assert!(!glob_match("*.rs", "main.toml"));
        assert!(glob_match("te?t.rs", "test.rs"));
    }

    #[test]
    fn ignore_rules_match_root_and_nested_folders() {
        let rules = IgnoreRules::parse("# comment\ntarget/\n/build\n*.log\n");
        assert!(rules.is_ignored("target/debug/main"));
        assert!(rules.is_ignored("build/out.txt"));
        assert!(!rules.is_ignored("src/build/inner.txt"));
        assert!(rules.is_ignored("notes.log"));
    }

    #[test]
    fn harvest_walks_directory_and_applies_filter() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("b.txt"), "not rust").unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target").join("c.rs"), "generated").unwrap();

        let options = HarvestOptions {
            root: dir.path().to_path_buf(),
            sources: vec![dir.path().to_path_buf()],
            filter_extensions: vec!["rs".to_string()],
            depth: None,
            ignore: IgnoreRules::parse("target/\n"),
        };
        let rows = harvest(&options, &AtomicBool::new(false)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].extension, "rs");
    }

    #[test]
    fn harvest_rejects_a_flag_already_tripped() {
        let dir = tempfile::tempdir().unwrap();
        let options = HarvestOptions {
            root: dir.path().to_path_buf(),
            sources: vec![dir.path().to_path_buf()],
            filter_extensions: Vec::new(),
            depth: None,
            ignore: IgnoreRules::new(),
        };
        let result = harvest(&options, &AtomicBool::new(true));
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
