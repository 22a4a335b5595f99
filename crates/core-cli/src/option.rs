//! Option and command-tree node types (spec components §3.2/§3.3).

use core_value::Arguments;

/// The declared value kind of an [`Option`]. Purely advisory for coercion at
/// retrieval time — the parser stores every raw token as a string and lets
/// [`Arguments`]'s coercing accessors do the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Int,
    UInt,
    String,
}

/// A named input a [`Command`] accepts.
#[derive(Debug, Clone)]
pub struct Option {
    pub name: String,
    pub letter: std::option::Option<char>,
    pub value_type: std::option::Option<ValueType>,
    pub global: bool,
    pub single: bool,
    pub flag: bool,
    pub description: String,
    pub rules: Arguments,
}

impl Option {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            letter: None,
            value_type: Some(ValueType::String),
            global: false,
            single: false,
            flag: false,
            description: String::new(),
            rules: Arguments::new(),
        }
    }

    pub fn letter(mut self, c: char) -> Self {
        self.letter = Some(c);
        self
    }

    pub fn flag(mut self) -> Self {
        self.flag = true;
        self.value_type = Some(ValueType::Bool);
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn value_type(mut self, vt: ValueType) -> Self {
        self.value_type = Some(vt);
        self
    }
}

/// A subcommand node in the command tree.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub options: Vec<Option>,
    pub subcommands: Vec<Command>,
    pub values: Arguments,
    pub active: bool,
    /// Unknown options fall back to the root command's option list.
    pub parent_lookup: bool,
    /// Unknown long options/letters are silently attached to the next value
    /// instead of raising a parse error.
    pub unchecked: bool,
    /// `-abc` bundles into `-a -b -c` when every letter matches a flag.
    pub single_dash: bool,
    pub first_token_index: usize,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            options: Vec::new(),
            subcommands: Vec::new(),
            values: Arguments::new(),
            active: false,
            parent_lookup: true,
            unchecked: false,
            single_dash: true,
            first_token_index: 0,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn option(mut self, option: Option) -> Self {
        self.options.push(option);
        self
    }

    pub fn subcommand(mut self, sub: Command) -> Self {
        self.subcommands.push(sub);
        self
    }

    pub fn unchecked(mut self) -> Self {
        self.unchecked = true;
        self
    }

    pub fn no_parent_lookup(mut self) -> Self {
        self.parent_lookup = false;
        self
    }

    /// The subcommand with `active` set, if any — the deepest one reached
    /// during `parse`, since activation recurses depth-first.
    pub fn active_subcommand(&self) -> std::option::Option<&Command> {
        self.subcommands.iter().find(|c| c.active).and_then(|c| {
            // Prefer the deepest active descendant.
            Some(c.active_subcommand().unwrap_or(c))
        })
    }

    pub fn find_option(&self, name: &str) -> std::option::Option<&Option> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn find_option_by_letter(&self, letter: char) -> std::option::Option<&Option> {
        self.options.iter().find(|o| o.letter == Some(letter))
    }

    /// Value lookup by name. When an `active` subcommand chain exists, reads
    /// from the deepest active node's value store; otherwise from this
    /// node's own.
    pub fn get(&self, name: &str) -> &core_value::Variant {
        self.active_subcommand()
            .map(|c| c.values.get_first(name))
            .unwrap_or_else(|| self.values.get_first(name))
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> Vec<&'a core_value::Variant> {
        self.active_subcommand()
            .unwrap_or(self)
            .values
            .iterate_named(name)
            .collect()
    }
}
