//! Hierarchical CLI option/command engine (spec component E, §4.4): token
//! scanning, an `Option`/`Command` tree, the parse algorithm, documentation
//! emission, and shell-safe roundtrip rendering.

mod doc;
mod error;
mod option;
mod parse;
mod roundtrip;
mod tokenizer;

pub use doc::{emit_with, render_dense, render_table, render_verbose, DocMode, EmitKind};
pub use error::Error;
pub use option::{Command, Option, ValueType};
pub use parse::parse;
pub use roundtrip::to_string;
pub use tokenizer::{tokenize_basic, tokenize_terminal};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_then_parse_then_roundtrip() {
        let mut cmd = Command::new("count").option(Option::new("source").letter('s'));
        let tokens = tokenize_basic("-s ./src").unwrap();
        parse(&mut cmd, &tokens).unwrap();
        assert_eq!(cmd.get("source").as_string(), "./src");
        assert_eq!(to_string(&cmd), "count --source ./src");
    }
}
