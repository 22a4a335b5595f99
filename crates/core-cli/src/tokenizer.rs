//! Shell-style tokenization, in two modes: `Basic` (whitespace + quote runs)
//! and `Terminal` (adds POSIX-ish backslash decoding both outside and
//! inside double quotes).

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Outside,
    Double,
    Single,
}

/// Whitespace-separated tokens; `"..."` and `'...'` quote runs. Inside
/// double quotes `\` escapes the following character literally (dropping
/// the backslash); inside single quotes nothing is special. An unterminated
/// quote is an error.
pub fn tokenize_basic(input: &str) -> Result<Vec<String>, Error> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut state = QuoteState::Outside;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            QuoteState::Outside => match c {
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                '"' => {
                    state = QuoteState::Double;
                    in_token = true;
                }
                '\'' => {
                    state = QuoteState::Single;
                    in_token = true;
                }
                other => {
                    current.push(other);
                    in_token = true;
                }
            },
            QuoteState::Double => match c {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err(Error::UnmatchedQuote),
                },
                '"' => state = QuoteState::Outside,
                other => current.push(other),
            },
            QuoteState::Single => match c {
                '\'' => state = QuoteState::Outside,
                other => current.push(other),
            },
        }
    }

    if state != QuoteState::Outside {
        return Err(Error::UnmatchedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn decode_outside_escape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        ' ' => Some(' '),
        _ => None,
    }
}

fn decode_double_quote_escape(c: char) -> Option<char> {
    match c {
        '"' => Some('"'),
        '\\' => Some('\\'),
        '$' => Some('$'),
        '`' => Some('`'),
        '\n' => Some('\n'),
        _ => None,
    }
}

/// POSIX-terminal tokenizer: on top of `tokenize_basic`'s quote runs,
/// outside quotes `\c` decodes `n/t/r/\/"/'/space` to their C meanings and
/// leaves any other `\c` as the literal two characters; inside double
/// quotes `\` only escapes `" \ $ \`` and newline; inside single quotes
/// everything is literal. A trailing backslash is an error.
pub fn tokenize_terminal(input: &str) -> Result<Vec<String>, Error> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut state = QuoteState::Outside;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            QuoteState::Outside => match c {
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                '"' => {
                    state = QuoteState::Double;
                    in_token = true;
                }
                '\'' => {
                    state = QuoteState::Single;
                    in_token = true;
                }
                '\\' => {
                    in_token = true;
                    match chars.next() {
                        Some(next) => match decode_outside_escape(next) {
                            Some(decoded) => current.push(decoded),
                            None => {
                                current.push('\\');
                                current.push(next);
                            }
                        },
                        None => return Err(Error::TrailingBackslash),
                    }
                }
                other => {
                    current.push(other);
                    in_token = true;
                }
            },
            QuoteState::Double => match c {
                '\\' => match chars.next() {
                    Some(next) => match decode_double_quote_escape(next) {
                        Some(decoded) => current.push(decoded),
                        None => {
                            current.push('\\');
                            current.push(next);
                        }
                    },
                    None => return Err(Error::TrailingBackslash),
                },
                '"' => state = QuoteState::Outside,
                other => current.push(other),
            },
            QuoteState::Single => match c {
                '\'' => state = QuoteState::Outside,
                other => current.push(other),
            },
        }
    }

    if state != QuoteState::Outside {
        return Err(Error::UnmatchedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenizes_quotes_and_escapes() {
        let out = tokenize_basic(r#"  alpha "b c" 'd\ne' \x  "#).unwrap();
        assert_eq!(out, vec!["alpha", "b c", "d\\ne", "\\x"]);
    }

    #[test]
    fn terminal_decodes_double_quote_escape() {
        let out = tokenize_terminal(r#"echo "a\"b" 'c\n'"#).unwrap();
        assert_eq!(out, vec!["echo", "a\"b", "c\\n"]);
    }

    #[test]
    fn basic_rejects_unmatched_quote() {
        assert_eq!(tokenize_basic(r#"alpha "unterminated"#).unwrap_err(), Error::UnmatchedQuote);
        assert_eq!(tokenize_basic("it's").unwrap_err(), Error::UnmatchedQuote);
    }

    #[test]
    fn terminal_rejects_trailing_backslash() {
        assert_eq!(tokenize_terminal(r"alpha\").unwrap_err(), Error::TrailingBackslash);
    }

    #[test]
    fn basic_and_terminal_agree_without_backslash() {
        let input = r#"one "two words" 'three'"#;
        assert_eq!(tokenize_basic(input).unwrap(), tokenize_terminal(input).unwrap());
    }
}
