//! Documentation emission (spec §4.4.4): `Table`, `Dense`, `Verbose`, and a
//! callback variant for rendering into an arbitrary sink (terminal, GUI,
//! IDE output pane).

use crate::option::{Command, Option as CliOption};

const NAME_COLUMN: usize = 25;
const DENSE_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocMode {
    Table,
    Dense,
    Verbose,
}

fn pad(name: &str, width: usize) -> String {
    if name.len() >= width {
        format!("{name} ")
    } else {
        format!("{name:<width$}")
    }
}

fn render_option_line(opt: &CliOption, out: &mut String) {
    let label = match opt.letter {
        Some(l) => format!("--{} (-{})", opt.name, l),
        None => format!("--{}", opt.name),
    };
    out.push_str(&pad(&label, NAME_COLUMN));
    out.push_str("*");
    out.push_str(&opt.description);
    out.push_str("*\n");
}

/// One line per option, name padded to 25 columns, description wrapped in
/// italics markers.
pub fn render_table(cmd: &Command) -> String {
    let mut out = String::new();
    for opt in &cmd.options {
        render_option_line(opt, &mut out);
    }
    out
}

/// An 80-column section: `## <name>` header, an `options` block, then a
/// `global options` block sourced from the parent's option list.
pub fn render_dense(cmd: &Command, parent_options: &[CliOption]) -> String {
    let mut out = String::new();
    out.push_str(&"#".repeat(1));
    out.push_str(&format!("# {}\n", cmd.name));
    out.push_str(&"-".repeat(DENSE_WIDTH));
    out.push('\n');
    out.push_str("options\n");
    for opt in &cmd.options {
        render_option_line(opt, &mut out);
    }
    if !parent_options.is_empty() {
        out.push_str("global options\n");
        for opt in parent_options {
            render_option_line(opt, &mut out);
        }
    }
    out
}

/// A multi-section help page with commands and nested options, indented one
/// level per depth.
pub fn render_verbose(cmd: &Command, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    let mut out = String::new();
    out.push_str(&format!("{indent}{} - {}\n", cmd.name, cmd.description));
    for opt in &cmd.options {
        out.push_str(&indent);
        out.push_str("  ");
        render_option_line(opt, &mut out);
    }
    for sub in &cmd.subcommands {
        out.push_str(&render_verbose(sub, depth + 1));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    Command,
    Option,
    Flag,
}

/// Invokes `cb(kind, name, description, option)` for each command/option/flag
/// in `cmd`'s tree so a caller can render it anywhere without depending on
/// any of the three built-in modes. `option` is `None` for `EmitKind::Command`.
pub fn emit_with<F>(cmd: &Command, cb: &mut F)
where
    F: FnMut(EmitKind, &str, &str, std::option::Option<&CliOption>),
{
    cb(EmitKind::Command, &cmd.name, &cmd.description, None);
    for opt in &cmd.options {
        let kind = if opt.flag { EmitKind::Flag } else { EmitKind::Option };
        cb(kind, &opt.name, &opt.description, Some(opt));
    }
    for sub in &cmd.subcommands {
        emit_with(sub, cb);
    }
}
