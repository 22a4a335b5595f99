//! Builds the command tree (spec §6.1): one global option set, plus one
//! subcommand node per row in the CLI surface table.

use core_cli::{Command, Option as CliOption, ValueType};

fn global_options(mut root: Command) -> Command {
    root = root.option(
        CliOption::new("logging")
            .flag()
            .describe("Enable file-based logging (oxidized.log in the current directory)"),
    );
    root = root.option(
        CliOption::new("logging-csv")
            .flag()
            .describe("Emit logs as CSV instead of the default tracing format"),
    );
    root = root.option(CliOption::new("print").flag().describe("Print the reconstructed command line before running it"));
    root = root.option(CliOption::new("explain").flag().describe("Print the dense help for the active subcommand and exit"));
    root = root.option(CliOption::new("help").letter('h').flag().describe("Print help for the command tree and exit"));
    root = root.option(CliOption::new("editor").describe("Preferred editor, persisted to settings"));
    root = root.option(CliOption::new("mode").describe("Operating mode, persisted to settings"));
    root = root.option(CliOption::new("settings").describe("Path to the settings TOML file (overrides the per-user default)"));
    root = root.option(CliOption::new("recursive").letter('R').flag().describe("Recurse into subdirectories"));
    root = root.option(CliOption::new("output").letter('o').describe("Write output to a file instead of stdout"));
    root
}

fn source_filter_options(cmd: Command) -> Command {
    cmd.option(CliOption::new("filter").describe("Comma-separated extension filter, e.g. rs,toml"))
        .option(CliOption::new("pattern").letter('p').describe("Literal substring pattern (repeatable)"))
        .option(CliOption::new("source").letter('s').describe("Semicolon- or comma-separated list of source paths"))
        .option(CliOption::new("segment").describe("Restrict matches to one of all|code|comment|string"))
        .option(CliOption::new("recursive").letter('R').flag().describe("Recurse into subdirectories"))
}

fn count_command() -> Command {
    let cmd = Command::new("count").describe("Count lines; optionally apply patterns and segment restriction");
    let cmd = source_filter_options(cmd);
    cmd.option(CliOption::new("page").value_type(ValueType::UInt).describe("Page index for paginated output"))
        .option(CliOption::new("page-size").value_type(ValueType::UInt).describe("Rows per page"))
        .option(CliOption::new("sort").describe("Sort rows by 'path' or 'count'"))
        .option(CliOption::new("stats").flag().describe("Print aggregate counters (files, lines, matches)"))
        .option(CliOption::new("table").flag().describe("Render rows as a padded table"))
}

fn list_command() -> Command {
    let cmd = Command::new("list").describe("Emit matching lines");
    let cmd = source_filter_options(cmd);
    cmd.option(CliOption::new("rpattern").describe("Regular-expression pattern (repeatable)"))
        .option(CliOption::new("context").describe("Context spec 'offset,count', e.g. -1,2"))
        .option(CliOption::new("expression").letter('e').describe("Additional literal expression pattern"))
        .option(CliOption::new("script").describe("Path to a script run per match (accepted, not executed)"))
        .option(CliOption::new("max").value_type(ValueType::UInt).describe("Maximum number of result rows"))
        .option(CliOption::new("match-all").flag().describe("Keep only lines where every pattern matched"))
}

fn dir_command() -> Command {
    let cmd = Command::new("dir").describe("List files matching filter");
    let cmd = cmd
        .option(CliOption::new("filter").describe("Comma-separated extension filter, e.g. rs,toml"))
        .option(CliOption::new("pattern").letter('p').describe("Literal substring pattern applied to file contents"))
        .option(CliOption::new("source").letter('s').describe("Semicolon- or comma-separated list of source paths"))
        .option(CliOption::new("script").describe("Path to a script run per file (accepted, not executed)"))
        .option(CliOption::new("sort").describe("Sort rows by 'path' or 'size'"))
        .option(CliOption::new("recursive").letter('R').flag().describe("Recurse into subdirectories"));
    cmd
}

fn copy_command() -> Command {
    Command::new("copy")
        .describe("Copy file")
        .option(CliOption::new("source").letter('s').describe("Source file path"))
        .option(CliOption::new("destination").letter('d').describe("Destination file path"))
        .option(CliOption::new("backup").letter('b').flag().describe("Back up the destination before overwriting"))
}

fn join_command() -> Command {
    Command::new("join")
        .describe("Concatenate files")
        .option(CliOption::new("source").letter('s').describe("Semicolon- or comma-separated list of source files"))
        .option(CliOption::new("destination").letter('d').describe("Destination file path"))
        .option(CliOption::new("backup").letter('b').flag().describe("Back up the destination before overwriting"))
}

fn db_command() -> Command {
    Command::new("db")
        .describe("Open/create SQLite file; update schema")
        .option(CliOption::new("file").letter('f').describe("Database file path"))
        .option(CliOption::new("settings").describe("Path to the settings TOML file"))
}

fn history_command() -> Command {
    Command::new("history")
        .describe("Print or initialize command history")
        .option(CliOption::new("create").flag().describe("Initialize a fresh history file"))
}

fn run_command() -> Command {
    Command::new("run")
        .describe("Run a command template from loaded settings")
        .option(CliOption::new("name").describe("Template name to run"))
        .option(CliOption::new("list").flag().describe("List template names and exit"))
}

/// Builds the full `cleaner` command tree, root options first.
pub fn build() -> Command {
    let root = Command::new("cleaner").describe("Source-tree scanning and maintenance tool");
    let root = global_options(root);
    root.subcommand(count_command())
        .subcommand(list_command())
        .subcommand(dir_command())
        .subcommand(copy_command())
        .subcommand(join_command())
        .subcommand(db_command())
        .subcommand(history_command())
        .subcommand(run_command())
        .subcommand(Command::new("help").describe("Print help for the command tree"))
        .subcommand(Command::new("version").describe("Print the tool's version"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_registers_every_surface_subcommand() {
        let tree = build();
        let names: Vec<&str> = tree.subcommands.iter().map(|c| c.name.as_str()).collect();
        for expected in ["count", "list", "dir", "copy", "join", "db", "history", "run", "help", "version"] {
            assert!(names.contains(&expected), "missing subcommand {expected}");
        }
    }

    #[test]
    fn parsing_activates_the_named_subcommand() {
        let mut tree = build();
        let tokens: Vec<String> = vec!["count".into(), "--source".into(), "./src".into()];
        core_cli::parse(&mut tree, &tokens).unwrap();
        let sub = tree.active_subcommand().expect("active subcommand");
        assert_eq!(sub.name, "count");
        assert_eq!(sub.values.get_first("source").as_string(), "./src");
    }

    #[test]
    fn global_flag_before_subcommand_lands_in_root_store() {
        let mut tree = build();
        let tokens: Vec<String> = vec!["--print".into(), "list".into(), "--pattern".into(), "TODO".into()];
        core_cli::parse(&mut tree, &tokens).unwrap();
        assert!(tree.values.get_first("print").as_bool());
        assert!(!tree.active_subcommand().unwrap().values.get_first("print").as_bool());
    }
}
