/// Command parser and AST definitions for tabula.
///
/// Modules:
/// - `ast`: parsed commands (meta-commands and statements)
/// - `parser`: word-level parser producing a `Command` from one input line

pub mod ast;
pub mod parser;

use ast::Command;
use parser::Parser;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("syntax error")]
    Syntax,

    #[error("unrecognized keyword at start of '{0}'")]
    UnrecognizedStatement(String),

    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),
}

/// Parse one input line into a command.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    Parser::new(line).parse_command()
}
