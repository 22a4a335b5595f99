//! Shell-safe argv reconstruction (spec §4.4.5): turns a parsed [`Command`]
//! back into a string that, re-tokenized, would reproduce the same values.

use crate::option::Command;
use core_value::Variant;

const SPECIAL: &[char] = &[' ', '"', '\'', '\\', '(', ')', '|', '&', ';', '<', '>', '*', '?', '[', ']', '{', '}', '$', '`'];

fn quote_if_needed(token: &str) -> String {
    if token.is_empty() || token.chars().any(|c| SPECIAL.contains(&c)) {
        let mut out = String::with_capacity(token.len() + 2);
        out.push('"');
        for c in token.chars() {
            if c == '"' || c == '\\' || c == '$' || c == '`' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        out
    } else {
        token.to_string()
    }
}

fn variant_to_token(v: &Variant) -> String {
    match v {
        Variant::Bool(true) => String::new(),
        Variant::Bool(false) => String::new(),
        other => quote_if_needed(&other.as_string()),
    }
}

/// Renders `cmd` (and its active descendant chain, if any) as a single
/// shell-safe command line: `name --opt value --flag subcommand --opt2 val2`.
pub fn to_string(cmd: &Command) -> String {
    let mut parts = vec![cmd.name.clone()];
    for opt in &cmd.options {
        for value in cmd.values.iterate_named(&opt.name) {
            if opt.flag {
                if matches!(value, Variant::Bool(true)) {
                    parts.push(format!("-{}", opt.name));
                }
            } else {
                parts.push(format!("--{}", opt.name));
                parts.push(variant_to_token(value));
            }
        }
    }
    if let Some(active) = cmd.subcommands.iter().find(|c| c.active) {
        parts.push(to_string(active));
        return parts.join(" ");
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::Option as CliOption;
    use crate::parse::parse;

    #[test]
    fn roundtrip_quotes_values_with_spaces() {
        let mut cmd = Command::new("count").option(CliOption::new("pattern").letter('p'));
        let tokens = vec!["--pattern".to_string(), "hello world".to_string()];
        parse(&mut cmd, &tokens).unwrap();
        let rendered = to_string(&cmd);
        assert_eq!(rendered, r#"count --pattern "hello world""#);
    }

    #[test]
    fn roundtrip_renders_flags_without_value() {
        let mut cmd = Command::new("list").option(CliOption::new("recursive").letter('R').flag());
        parse(&mut cmd, &["-R".to_string()]).unwrap();
        assert_eq!(to_string(&cmd), "list -recursive");
    }
}
