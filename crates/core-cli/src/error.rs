#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error("miss match arguments and values")]
    MissingValue,
    #[error("No active option for value")]
    NoActiveOption,
    #[error("unmatched quote")]
    UnmatchedQuote,
    #[error("trailing backslash")]
    TrailingBackslash,
}
