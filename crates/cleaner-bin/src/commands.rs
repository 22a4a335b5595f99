//! One function per CLI surface subcommand (spec §6.1), each taking the
//! active subcommand node's parsed values and a [`Context`] carrying the
//! cross-cutting bits (root command, settings, output sink).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use tracing::{info, warn};

use core_cli::Command;
use core_config::Settings;
use core_harvest::{HarvestOptions, IgnoreRules, ResultRow};
use core_search::{ContextSpec, MatchRow, Pattern, SearchOptions, Segment};

use crate::error::AppError;

pub struct Context<'a> {
    pub root: &'a Command,
    pub settings: &'a mut Settings,
    pub output: &'a mut dyn Write,
}

impl<'a> Context<'a> {
    fn emit(&mut self, line: &str) -> Result<(), AppError> {
        writeln!(self.output, "{line}").map_err(AppError::from)
    }
}

fn parse_segment(value: &str) -> Segment {
    match value {
        "code" => Segment::Code,
        "comment" => Segment::Comment,
        "string" => Segment::String,
        _ => Segment::All,
    }
}

fn parse_filter(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_context(value: &str) -> ContextSpec {
    let mut parts = value.splitn(2, ',');
    let offset = parts.next().and_then(|s| s.trim().parse::<isize>().ok()).unwrap_or(0);
    let count = parts.next().and_then(|s| s.trim().parse::<usize>().ok()).unwrap_or(0);
    ContextSpec { offset, count }
}

fn harvest_options(sub: &Command, root: &Command) -> Result<HarvestOptions, AppError> {
    let root_dir = std::env::current_dir()?;
    let source_value = sub.values.get_first("source").as_string();
    let sources = if source_value.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        core_harvest::split_source_list(&source_value)
    };
    let recursive = sub.values.get_first("recursive").as_bool() || root.values.get_first("recursive").as_bool();
    let ignore = IgnoreRules::discover(&root_dir)?.unwrap_or_default();
    Ok(HarvestOptions {
        root: root_dir,
        sources,
        filter_extensions: parse_filter(&sub.values.get_first("filter").as_string()),
        depth: if recursive { None } else { Some(1) },
        ignore,
    })
}

/// Dispatches each harvested file to its own worker thread (spec §5: "shared
/// immutable input and per-file isolation"), appending each worker's rows to
/// the shared table under a single mutex. `cancel` is shared across every
/// worker: tripping it between files or mid-read stops the affected workers
/// early (spec §5's cooperative cancellation), preserving whatever matches
/// they already found.
fn search_all(rows: &[ResultRow], options: &SearchOptions, cancel: &AtomicBool) -> Result<Vec<MatchRow>, AppError> {
    let results = Mutex::new(Vec::new());
    std::thread::scope(|scope| -> Result<(), AppError> {
        let mut handles = Vec::new();
        for row in rows {
            let path = row.path.clone();
            handles.push(scope.spawn(move || core_search::search_file(&path, options, cancel)));
        }
        for (handle, row) in handles.into_iter().zip(rows) {
            match handle.join() {
                Ok(Ok(mut matches)) => results.lock().unwrap().append(&mut matches),
                Ok(Err(e)) => warn!(file = %row.path.display(), error = %e, "search_file_failed"),
                Err(_) => warn!(file = %row.path.display(), "search_worker_panicked"),
            }
        }
        Ok(())
    })?;
    Ok(results.into_inner().unwrap())
}

pub fn count(ctx: &mut Context, sub: &Command) -> Result<(), AppError> {
    let cancel = AtomicBool::new(false);
    let options = harvest_options(sub, ctx.root)?;
    let rows = core_harvest::harvest(&options, &cancel)?;

    let pattern_text = sub.values.get_first("pattern").as_string();
    let segment = parse_segment(&sub.values.get_first("segment").as_string());

    let mut counted: Vec<(PathBuf, u64)> = Vec::with_capacity(rows.len());
    let mut total_lines = 0u64;
    let mut total_matches = 0u64;
    for row in &rows {
        let line_count = count_lines(&row.path).unwrap_or(0);
        total_lines += line_count;
        let n = if pattern_text.is_empty() {
            line_count
        } else {
            let search_opts = SearchOptions { patterns: vec![Pattern::literal(pattern_text.clone())], segment, ..Default::default() };
            let matches = core_search::search_file(&row.path, &search_opts, &cancel)?;
            matches.len() as u64
        };
        total_matches += n;
        counted.push((row.path.clone(), n));
    }

    match sub.values.get_first("sort").as_string().as_str() {
        "count" => counted.sort_by(|a, b| b.1.cmp(&a.1)),
        _ => counted.sort_by(|a, b| a.0.cmp(&b.0)),
    }

    let page_size = sub.values.get_first("page-size").as_uint() as usize;
    let page = sub.values.get_first("page").as_uint() as usize;
    let page_rows: Vec<_> = if page_size > 0 {
        counted.iter().skip(page * page_size).take(page_size).collect()
    } else {
        counted.iter().collect()
    };

    let table = sub.values.get_first("table").as_bool();
    for (path, n) in &page_rows {
        if table {
            ctx.emit(&format!("{:<50} {:>10}", path.display(), n))?;
        } else {
            ctx.emit(&format!("{}: {}", path.display(), n))?;
        }
    }

    if sub.values.get_first("stats").as_bool() {
        ctx.emit(&format!("files={} lines={} matches={}", rows.len(), total_lines, total_matches))?;
    }
    Ok(())
}

fn count_lines(path: &Path) -> std::io::Result<u64> {
    use std::io::BufRead;
    let file = fs::File::open(path)?;
    Ok(std::io::BufReader::new(file).lines().count() as u64)
}

pub fn list(ctx: &mut Context, sub: &Command) -> Result<(), AppError> {
    let cancel = AtomicBool::new(false);
    let options = harvest_options(sub, ctx.root)?;
    let rows = core_harvest::harvest(&options, &cancel)?;

    let mut patterns = Vec::new();
    let literal = sub.values.get_first("pattern").as_string();
    if !literal.is_empty() {
        patterns.push(Pattern::literal(literal));
    }
    let expression = sub.values.get_first("expression").as_string();
    if !expression.is_empty() {
        patterns.push(Pattern::literal(expression));
    }
    let rpattern = sub.values.get_first("rpattern").as_string();
    if !rpattern.is_empty() {
        patterns.push(Pattern::regex(&rpattern)?);
    }

    let context_value = sub.values.get_first("context").as_string();
    let search_options = SearchOptions {
        patterns,
        segment: parse_segment(&sub.values.get_first("segment").as_string()),
        max_results: {
            let max = sub.values.get_first("max").as_uint();
            if max > 0 { Some(max as usize) } else { None }
        },
        match_all: sub.values.get_first("match-all").as_bool(),
        context: if context_value.is_empty() { ContextSpec::default() } else { parse_context(&context_value) },
    };

    let matches = search_all(&rows, &search_options, &cancel)?;
    for row in &matches {
        ctx.emit(&format!("{}:{}:{}: {}", row.file.display(), row.line_number, row.column, row.line_text.trim_end_matches('\n')))?;
        if !row.context_text.is_empty() {
            ctx.emit(row.context_text.trim_end_matches('\n'))?;
        }
    }
    Ok(())
}

pub fn dir(ctx: &mut Context, sub: &Command) -> Result<(), AppError> {
    let options = HarvestOptions {
        root: std::env::current_dir()?,
        sources: {
            let source_value = sub.values.get_first("source").as_string();
            if source_value.is_empty() { vec![PathBuf::from(".")] } else { core_harvest::split_source_list(&source_value) }
        },
        filter_extensions: parse_filter(&sub.values.get_first("filter").as_string()),
        depth: if sub.values.get_first("recursive").as_bool() || ctx.root.values.get_first("recursive").as_bool() { None } else { Some(1) },
        ignore: IgnoreRules::discover(&std::env::current_dir()?)?.unwrap_or_default(),
    };
    let mut rows = core_harvest::harvest(&options, &AtomicBool::new(false))?;

    let pattern = sub.values.get_first("pattern").as_string();
    if !pattern.is_empty() {
        rows.retain(|row| fs::read_to_string(&row.path).map(|text| text.contains(&pattern)).unwrap_or(false));
    }

    match sub.values.get_first("sort").as_string().as_str() {
        "size" => rows.sort_by(|a, b| b.size.cmp(&a.size)),
        _ => rows.sort_by(|a, b| a.path.cmp(&b.path)),
    }

    for row in &rows {
        ctx.emit(&format!("{}\t{}\t{}", row.path.display(), row.size, row.extension))?;
    }
    Ok(())
}

fn backup_if_exists(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        let mut backup_name = path.as_os_str().to_os_string();
        backup_name.push(".bak");
        fs::copy(path, PathBuf::from(backup_name))?;
    }
    Ok(())
}

pub fn copy(_ctx: &mut Context, sub: &Command) -> Result<(), AppError> {
    let source = sub.values.get_first("source").as_string();
    let destination = sub.values.get_first("destination").as_string();
    if source.is_empty() || destination.is_empty() {
        return Err(AppError::Parse("copy requires --source and --destination".into()));
    }
    let dest_path = PathBuf::from(&destination);
    if sub.values.get_first("backup").as_bool() {
        backup_if_exists(&dest_path)?;
    }
    fs::copy(&source, &dest_path)?;
    info!(source, destination, "copy_complete");
    Ok(())
}

pub fn join(_ctx: &mut Context, sub: &Command) -> Result<(), AppError> {
    let source_value = sub.values.get_first("source").as_string();
    let destination = sub.values.get_first("destination").as_string();
    if source_value.is_empty() || destination.is_empty() {
        return Err(AppError::Parse("join requires --source and --destination".into()));
    }
    let dest_path = PathBuf::from(&destination);
    if sub.values.get_first("backup").as_bool() {
        backup_if_exists(&dest_path)?;
    }
    let mut out = fs::File::create(&dest_path)?;
    for source in core_harvest::split_source_list(&source_value) {
        let bytes = fs::read(&source)?;
        out.write_all(&bytes)?;
    }
    info!(destination, "join_complete");
    Ok(())
}

/// `db` is a stub (SPEC_FULL §3): it builds SQL text by substitution and
/// prints it, matching the original's templating approach, without touching
/// an actual database file.
pub fn db(ctx: &mut Context, sub: &Command) -> Result<(), AppError> {
    let file = sub.values.get_first("file").as_string();
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS files (path TEXT, size INTEGER, extension TEXT);\n\
         -- target database: {}\n\
         INSERT INTO files (path, size, extension) VALUES (?, ?, ?);",
        if file.is_empty() { "<unspecified>".to_string() } else { file }
    );
    ctx.emit(&sql)
}

pub fn history(ctx: &mut Context, sub: &Command) -> Result<(), AppError> {
    if sub.values.get_first("create").as_bool() {
        *ctx.settings = Settings::default();
        ctx.emit("history initialized")?;
    } else {
        for line in ctx.settings.history_lines().collect::<Vec<_>>() {
            ctx.emit(line)?;
        }
    }
    Ok(())
}

pub fn run(ctx: &mut Context, sub: &Command) -> Result<(), AppError> {
    if sub.values.get_first("list").as_bool() {
        for (name, template) in ctx.settings.list_templates() {
            ctx.emit(&format!("{name}: {template}"))?;
        }
        return Ok(());
    }

    let name = sub.values.get_first("name").as_string();
    let template = ctx
        .settings
        .get_template(&name)
        .ok_or_else(|| AppError::Runtime(anyhow::anyhow!("no run template named '{name}'")))?
        .to_string();

    let tokens = core_cli::tokenize_terminal(&template)?;
    let mut tree = crate::cli::build();
    core_cli::parse(&mut tree, &tokens)?;
    crate::dispatch(&mut *ctx.settings, &tree, &mut *ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parsed(argv: &[&str]) -> Command {
        let mut tree = crate::cli::build();
        let tokens: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        core_cli::parse(&mut tree, &tokens).unwrap();
        tree
    }

    #[test]
    fn count_without_pattern_counts_lines() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "one\ntwo\nthree\n").unwrap();

        let tree = parsed(&["count", "--source", dir.path().to_str().unwrap()]);
        let mut settings = Settings::default();
        let mut out = Vec::new();
        {
            let mut ctx = Context { root: &tree, settings: &mut settings, output: &mut out };
            count(&mut ctx, tree.active_subcommand().unwrap()).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("a.rs: 3"));
    }

    #[test]
    fn count_with_pattern_counts_matches_not_lines() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "// TODO one\nlet x = 1;\n// TODO two\n").unwrap();

        let tree = parsed(&["count", "--source", dir.path().to_str().unwrap(), "--pattern", "TODO"]);
        let mut settings = Settings::default();
        let mut out = Vec::new();
        {
            let mut ctx = Context { root: &tree, settings: &mut settings, output: &mut out };
            count(&mut ctx, tree.active_subcommand().unwrap()).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("a.rs: 2"));
    }

    #[test]
    fn dir_filters_by_extension_and_sorts_by_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("small.rs"), "x").unwrap();
        fs::write(dir.path().join("big.rs"), "xxxxxxxxxx").unwrap();
        fs::write(dir.path().join("skip.toml"), "ignored").unwrap();

        let tree = parsed(&["dir", "--source", dir.path().to_str().unwrap(), "--filter", "rs", "--sort", "size"]);
        let mut settings = Settings::default();
        let mut out = Vec::new();
        {
            let mut ctx = Context { root: &tree, settings: &mut settings, output: &mut out };
            dir(&mut ctx, tree.active_subcommand().unwrap()).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("skip.toml"));
        let big_pos = text.find("big.rs").unwrap();
        let small_pos = text.find("small.rs").unwrap();
        assert!(big_pos < small_pos);
    }

    #[test]
    fn copy_with_backup_preserves_previous_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let dest = dir.path().join("dest.txt");
        fs::write(&source, "new").unwrap();
        fs::write(&dest, "old").unwrap();

        let tree = parsed(&["copy", "--source", source.to_str().unwrap(), "--destination", dest.to_str().unwrap(), "--backup"]);
        let mut settings = Settings::default();
        let mut out = Vec::new();
        let mut ctx = Context { root: &tree, settings: &mut settings, output: &mut out };
        copy(&mut ctx, tree.active_subcommand().unwrap()).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
        let backup_name = {
            let mut s = dest.as_os_str().to_os_string();
            s.push(".bak");
            PathBuf::from(s)
        };
        assert_eq!(fs::read_to_string(backup_name).unwrap(), "old");
    }

    #[test]
    fn join_concatenates_sources_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        let dest = dir.path().join("joined.txt");
        fs::write(&a, "first;").unwrap();
        fs::write(&b, "second").unwrap();

        let source_list = format!("{};{}", a.to_str().unwrap(), b.to_str().unwrap());
        let tree = parsed(&["join", "--source", &source_list, "--destination", dest.to_str().unwrap()]);
        let mut settings = Settings::default();
        let mut out = Vec::new();
        let mut ctx = Context { root: &tree, settings: &mut settings, output: &mut out };
        join(&mut ctx, tree.active_subcommand().unwrap()).unwrap();

        assert_eq!(fs::read_to_string(dest).unwrap(), "first;second");
    }

    #[test]
    fn history_create_resets_to_default_settings() {
        let tree = parsed(&["history", "--create"]);
        let mut settings = Settings::default();
        settings.add_history("count --source .");
        let mut out = Vec::new();
        let mut ctx = Context { root: &tree, settings: &mut settings, output: &mut out };
        history(&mut ctx, tree.active_subcommand().unwrap()).unwrap();
        assert!(settings.history_lines().next().is_none());
    }

    #[test]
    fn history_without_create_prints_existing_entries() {
        let tree = parsed(&["history"]);
        let mut settings = Settings::default();
        settings.add_history("count --source .");
        let mut out = Vec::new();
        let mut ctx = Context { root: &tree, settings: &mut settings, output: &mut out };
        history(&mut ctx, tree.active_subcommand().unwrap()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "count --source .");
    }

    #[test]
    fn run_dispatches_a_stored_template() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "one\ntwo\n").unwrap();

        let tree = parsed(&["run", "--name", "recount"]);
        let mut settings = Settings::default();
        settings
            .run_templates
            .insert("recount".to_string(), format!("count --source {}", dir.path().to_str().unwrap()));
        let mut out = Vec::new();
        let mut ctx = Context { root: &tree, settings: &mut settings, output: &mut out };
        run(&mut ctx, tree.active_subcommand().unwrap()).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("a.rs: 2"));
    }

    #[test]
    fn db_prints_substituted_sql_without_touching_disk() {
        let tree = parsed(&["db", "--file", "scratch.sqlite"]);
        let mut settings = Settings::default();
        let mut out = Vec::new();
        let mut ctx = Context { root: &tree, settings: &mut settings, output: &mut out };
        db(&mut ctx, tree.active_subcommand().unwrap()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("scratch.sqlite"));
        assert!(!Path::new("scratch.sqlite").exists());
    }
}
