//! The parse algorithm (spec §4.4.2): tokens beginning `--` are long
//! options, `-` bundles/abbreviates when `single_dash` is set, subcommand
//! names recurse, and anything else is a positional or pending value.

use crate::error::Error;
use crate::option::{Command, Option as CliOption, ValueType};
use core_value::Variant;

fn coerce(token: &str, value_type: std::option::Option<ValueType>) -> Variant {
    match value_type {
        Some(ValueType::Int) => token
            .parse::<i64>()
            .map(Variant::Int)
            .unwrap_or_else(|_| Variant::Str(token.to_string())),
        Some(ValueType::UInt) => token
            .parse::<u64>()
            .map(Variant::UInt)
            .unwrap_or_else(|_| Variant::Str(token.to_string())),
        Some(ValueType::Bool) => Variant::Bool(token != "false" && token != "0"),
        _ => Variant::Str(token.to_string()),
    }
}

fn lookup<'a>(cmd: &'a Command, root: &'a [CliOption], name: &str) -> std::option::Option<&'a CliOption> {
    cmd.find_option(name).or_else(|| {
        if cmd.parent_lookup {
            root.iter().find(|o| o.name == name)
        } else {
            None
        }
    })
}

fn lookup_letter<'a>(cmd: &'a Command, root: &'a [CliOption], letter: char) -> std::option::Option<&'a CliOption> {
    cmd.find_option_by_letter(letter).or_else(|| {
        if cmd.parent_lookup {
            root.iter().find(|o| o.letter == Some(letter))
        } else {
            None
        }
    })
}

/// Parses `tokens` into `cmd`'s (and any activated descendant's) value
/// store. The top-level call's own option list is the "root" fallback for
/// every `parent_lookup`-enabled descendant, matching the spec's
/// resolution of unknown-option lookup order: current node first, then the
/// root.
pub fn parse(cmd: &mut Command, tokens: &[String]) -> Result<(), Error> {
    let root_options = cmd.options.clone();
    parse_inner(cmd, tokens, &root_options)
}

fn parse_inner(cmd: &mut Command, tokens: &[String], root_options: &[CliOption]) -> Result<(), Error> {
    let mut i = 0usize;
    let mut positional_allowed = true;
    let mut positional_index = 0usize;
    let mut pending_unchecked: std::option::Option<String> = None;

    while i < tokens.len() {
        let tok = tokens[i].as_str();

        if let Some(name) = tok.strip_prefix("--") {
            positional_allowed = false;
            match lookup(cmd, root_options, name) {
                Some(opt) if opt.flag => {
                    cmd.values.append(opt.name.clone(), true);
                    i += 1;
                }
                Some(opt) => {
                    let vt = opt.value_type;
                    let opt_name = opt.name.clone();
                    i += 1;
                    let value_tok = tokens.get(i).ok_or(Error::MissingValue)?;
                    cmd.values.append(opt_name, coerce(value_tok, vt));
                    i += 1;
                }
                None if cmd.unchecked => {
                    pending_unchecked = Some(name.to_string());
                    i += 1;
                }
                None => return Err(Error::UnknownOption(tok.to_string())),
            }
            continue;
        }

        if cmd.single_dash && tok.starts_with('-') && tok.len() > 1 && !tok.starts_with("--") {
            let rest = &tok[1..];
            positional_allowed = false;
            if rest.chars().count() == 1 {
                let letter = rest.chars().next().unwrap();
                match lookup_letter(cmd, root_options, letter) {
                    Some(opt) if opt.flag => {
                        cmd.values.append(opt.name.clone(), true);
                        i += 1;
                    }
                    Some(opt) => {
                        let vt = opt.value_type;
                        let opt_name = opt.name.clone();
                        i += 1;
                        let value_tok = tokens.get(i).ok_or(Error::MissingValue)?;
                        cmd.values.append(opt_name, coerce(value_tok, vt));
                        i += 1;
                    }
                    None if cmd.unchecked => {
                        pending_unchecked = Some(letter.to_string());
                        i += 1;
                    }
                    None => return Err(Error::UnknownOption(tok.to_string())),
                }
            } else {
                let mut matched_names = Vec::new();
                let mut all_matched = true;
                for letter in rest.chars() {
                    match lookup_letter(cmd, root_options, letter) {
                        Some(opt) if opt.flag => matched_names.push(opt.name.clone()),
                        _ => {
                            all_matched = false;
                            break;
                        }
                    }
                }
                if all_matched {
                    for name in matched_names {
                        cmd.values.append(name, true);
                    }
                    i += 1;
                } else if cmd.unchecked {
                    i += 1;
                } else {
                    return Err(Error::UnknownOption(tok.to_string()));
                }
            }
            continue;
        }

        if let Some(pos) = cmd.subcommands.iter().position(|c| c.name == tok) {
            cmd.subcommands[pos].active = true;
            parse_inner(&mut cmd.subcommands[pos], &tokens[i + 1..], root_options)?;
            return Ok(());
        }

        if let Some(name) = pending_unchecked.take() {
            cmd.values.append(name, tok.to_string());
            i += 1;
            continue;
        }

        if positional_allowed && positional_index < cmd.options.len() {
            let opt_name = cmd.options[positional_index].name.clone();
            let vt = cmd.options[positional_index].value_type;
            cmd.values.append(opt_name, coerce(tok, vt));
            positional_index += 1;
            i += 1;
            continue;
        }

        return Err(Error::NoActiveOption);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::Option as CliOption;

    fn build_tree() -> Command {
        Command::new("prog")
            .option(CliOption::new("help").letter('h').flag().global())
            .subcommand(
                Command::new("count")
                    .option(CliOption::new("source").letter('s'))
                    .option(CliOption::new("pattern").letter('p'))
                    .option(CliOption::new("recursive").letter('R').flag()),
            )
            .subcommand(Command::new("list").option(CliOption::new("source").letter('s')))
    }

    #[test]
    fn parse_subcommand_with_short_options() {
        let mut tree = build_tree();
        let tokens: Vec<String> = ["count", "-s", "./src", "-p", "TODO", "-R"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        parse(&mut tree, &tokens).unwrap();

        let count = tree.subcommands.iter().find(|c| c.name == "count").unwrap();
        assert!(count.active);
        assert_eq!(count.values.get_first("source").as_string(), "./src");
        assert_eq!(count.values.get_first("pattern").as_string(), "TODO");
        assert!(count.values.get_first("recursive").as_bool());
    }

    #[test]
    fn unknown_long_option_is_an_error() {
        let mut tree = build_tree();
        let tokens = vec!["count".to_string(), "--bogus".to_string()];
        assert_eq!(
            parse(&mut tree, &tokens).unwrap_err(),
            Error::UnknownOption("--bogus".to_string())
        );
    }

    #[test]
    fn unchecked_node_attaches_unknown_to_next_value() {
        let mut tree = Command::new("prog").subcommand(
            Command::new("run")
                .unchecked()
                .option(CliOption::new("name")),
        );
        let tokens: Vec<String> = ["run", "--extra", "value"].iter().map(|s| s.to_string()).collect();
        parse(&mut tree, &tokens).unwrap();
        let run = &tree.subcommands[0];
        assert_eq!(run.values.get_first("extra").as_string(), "value");
    }

    #[test]
    fn missing_value_is_an_error() {
        let mut tree = build_tree();
        let tokens = vec!["count".to_string(), "-s".to_string()];
        assert_eq!(parse(&mut tree, &tokens).unwrap_err(), Error::MissingValue);
    }

    #[test]
    fn flag_bundle_expands_each_letter() {
        let mut tree = Command::new("prog").subcommand(
            Command::new("list")
                .option(CliOption::new("a").letter('a').flag())
                .option(CliOption::new("b").letter('b').flag())
                .option(CliOption::new("c").letter('c').flag()),
        );
        let tokens: Vec<String> = ["list", "-abc"].iter().map(|s| s.to_string()).collect();
        parse(&mut tree, &tokens).unwrap();
        let list = &tree.subcommands[0];
        assert!(list.values.get_first("a").as_bool());
        assert!(list.values.get_first("b").as_bool());
        assert!(list.values.get_first("c").as_bool());
    }

    #[test]
    fn parent_lookup_finds_global_option_from_subcommand() {
        let mut tree = build_tree();
        let tokens: Vec<String> = ["count", "--help"].iter().map(|s| s.to_string()).collect();
        parse(&mut tree, &tokens).unwrap();
        let count = tree.subcommands.iter().find(|c| c.name == "count").unwrap();
        assert!(count.values.get_first("help").as_bool());
    }
}
