use thiserror::Error;

/// Errors raised while loading program text.
///
/// The variant names the bracket that lacks a partner: a `]` with nothing
/// open is `UnmatchedCloseBracket`, not "mismatched `[`". Both variants carry
/// the instruction index (after comment stripping) of that bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    /// A `[` was never closed.
    #[error("unmatched '[' at instruction {index}")]
    UnmatchedOpenBracket { index: usize },
    /// A `]` appeared with no open `[` before it.
    #[error("unmatched ']' at instruction {index}")]
    UnmatchedCloseBracket { index: usize },
}

/// Errors raised while building a machine from its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("tape size must be at least one cell")]
    EmptyTape,
}
