//! `cleaner` entrypoint (spec §6.1): parses argv with the hand-rolled CLI
//! engine, wires the active subcommand to the harvester/search/repository
//! crates, and maps their errors onto the three non-zero exit codes.

mod cli;
mod commands;
mod error;
mod logging;

use std::io::{self, Write};

use tracing::{debug, info};

use core_cli::Command;
use core_config::Settings;

use commands::Context;
use error::AppError;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut tree = cli::build();
    let logging_on = args.iter().any(|a| a == "--logging" || a == "--logging-csv");
    let csv = args.iter().any(|a| a == "--logging-csv");
    let _log_guard = logging::init(logging_on, csv);

    info!(argv = ?args, "startup");

    if let Err(e) = core_cli::parse(&mut tree, &args) {
        eprintln!("{e}");
        eprintln!("{}", help_for_active(&tree));
        std::process::exit(1);
    }

    if global_flag(&tree, "print") {
        println!("{}", core_cli::to_string(&tree));
    }
    if global_flag(&tree, "explain") {
        println!("{}", help_for_active(&tree));
        std::process::exit(0);
    }
    if global_flag(&tree, "help") {
        println!("{}", core_cli::render_verbose(&tree, 0));
        std::process::exit(0);
    }

    let settings_path = tree.values.get_first("settings").as_string();
    let settings_path = if settings_path.is_empty() { None } else { Some(std::path::PathBuf::from(settings_path)) };
    let mut settings = match Settings::load(settings_path.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(3);
        }
    };

    apply_global_settings(&tree, &mut settings);
    settings.add_history(core_cli::to_string(&tree));

    let mut stdout = io::stdout();
    let output_path = tree.values.get_first("output").as_string();
    let exit_code = if !output_path.is_empty() {
        match std::fs::File::create(&output_path) {
            Ok(mut file) => run_dispatch(&mut settings, &tree, &mut file),
            Err(e) => {
                eprintln!("{e}");
                3
            }
        }
    } else {
        run_dispatch(&mut settings, &tree, &mut stdout)
    };

    if let Err(e) = settings.save(settings_path.as_deref()) {
        debug!(error = %e, "settings_save_failed");
    }

    std::process::exit(exit_code);
}

fn run_dispatch(settings: &mut Settings, tree: &Command, output: &mut dyn Write) -> i32 {
    match dispatch(settings, tree, output) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{e}");
            if matches!(e, AppError::Parse(_)) {
                eprintln!("{}", help_for_active(tree));
            }
            e.exit_code()
        }
    }
}

fn apply_global_settings(tree: &Command, settings: &mut Settings) {
    let editor = tree.values.get_first("editor").as_string();
    if !editor.is_empty() {
        settings.general.editor = Some(editor);
    }
    let mode = tree.values.get_first("mode").as_string();
    if !mode.is_empty() {
        settings.general.mode = Some(mode);
    }
}

/// Global flags (§6.1) resolve through parent lookup, so a flag given after
/// the subcommand name lands in the subcommand's own value store rather than
/// the root's; check both rather than assume a fixed position.
fn global_flag(tree: &Command, name: &str) -> bool {
    tree.values.get_first(name).as_bool() || tree.active_subcommand().map(|s| s.values.get_first(name).as_bool()).unwrap_or(false)
}

fn help_for_active(tree: &Command) -> String {
    match tree.active_subcommand() {
        Some(sub) => core_cli::render_dense(sub, &tree.options),
        None => core_cli::render_verbose(tree, 0),
    }
}

/// Dispatches the active subcommand. Also reachable from `commands::run`,
/// which re-enters here after parsing a stored template's tokens.
pub fn dispatch(settings: &mut Settings, root: &Command, output: &mut dyn Write) -> Result<(), AppError> {
    let Some(sub) = root.active_subcommand() else {
        writeln!(output, "{}", core_cli::render_verbose(root, 0))?;
        return Ok(());
    };

    if sub.name == "help" {
        writeln!(output, "{}", core_cli::render_verbose(root, 0))?;
        return Ok(());
    }
    if sub.name == "version" {
        writeln!(output, "cleaner {}", env!("CARGO_PKG_VERSION"))?;
        return Ok(());
    }

    let mut ctx = Context { root, settings, output };
    match sub.name.as_str() {
        "count" => commands::count(&mut ctx, sub),
        "list" => commands::list(&mut ctx, sub),
        "dir" => commands::dir(&mut ctx, sub),
        "copy" => commands::copy(&mut ctx, sub),
        "join" => commands::join(&mut ctx, sub),
        "db" => commands::db(&mut ctx, sub),
        "history" => commands::history(&mut ctx, sub),
        "run" => commands::run(&mut ctx, sub),
        other => Err(AppError::Parse(format!("unknown subcommand: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flag_checks_both_root_and_active_subcommand_stores() {
        let mut tree = cli::build();
        let tokens: Vec<String> = vec!["--help".into(), "count".into()];
        core_cli::parse(&mut tree, &tokens).unwrap();
        assert!(global_flag(&tree, "help"));

        let mut tree = cli::build();
        let tokens: Vec<String> = vec!["count".into(), "--help".into()];
        core_cli::parse(&mut tree, &tokens).unwrap();
        assert!(global_flag(&tree, "help"));
    }

    #[test]
    fn version_subcommand_prints_the_crate_version() {
        let mut tree = cli::build();
        let tokens: Vec<String> = vec!["version".into()];
        core_cli::parse(&mut tree, &tokens).unwrap();
        let mut settings = Settings::default();
        let mut out = Vec::new();
        dispatch(&mut settings, &tree, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn unknown_option_is_reported_as_a_parse_error() {
        let mut tree = cli::build();
        let tokens: Vec<String> = vec!["count".into(), "--not-a-real-option".into()];
        assert!(core_cli::parse(&mut tree, &tokens).is_err());
    }
}
