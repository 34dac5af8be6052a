/// Top-level integration crate for tabula.
///
/// `Session` turns one input line at a time into the REPL's transcript text,
/// and `run` drives a session over any line source and output sink.
use std::io::{self, BufRead, Write};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use tabula_executor::{ExecuteError, ExecuteOutcome};
use tabula_parser::ast::{Command, MetaCommand};
use tabula_parser::ParseError;
use tabula_storage::{StorageError, Table, TableConfig, ValidationError};

pub const PROMPT: &str = "db> ";

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

/// What a single line asks the driver to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Print this text and keep reading.
    Output(String),
    Exit,
}

pub struct Session {
    table: Table,
}

impl Session {
    pub fn open<P: AsRef<Path>>(path: P, config: TableConfig) -> Result<Self, StorageError> {
        Ok(Self {
            table: Table::open_with_config(path, config)?,
        })
    }

    /// Execute one line. Rejected commands are reported as text; only storage
    /// failures below the tree (I/O, corruption) are returned as errors.
    pub fn execute(&mut self, line: &str) -> Result<Response, SessionError> {
        let command = match tabula_parser::parse(line) {
            Ok(command) => command,
            Err(err) => return Ok(Response::Output(parse_error_text(&err))),
        };

        let text = match command {
            Command::Meta(MetaCommand::Exit) => return Ok(Response::Exit),
            Command::Meta(MetaCommand::BTree) => {
                match tabula_executor::render_tree(&mut self.table) {
                    Ok(tree) => format!("Tree:\n{tree}"),
                    Err(ExecuteError::Storage(err)) => return Err(err.into()),
                    Err(err) => execute_error_text(&err),
                }
            }
            Command::Meta(MetaCommand::Constants) => {
                format!("Constants:\n{}", tabula_executor::constants())
            }
            Command::Statement(statement) => {
                match tabula_executor::execute(&statement, &mut self.table) {
                    Ok(ExecuteOutcome::Inserted) => "Executed.\n".to_string(),
                    Ok(ExecuteOutcome::Rows(rows)) => {
                        let mut out = String::new();
                        for row in rows {
                            out.push_str(&format!("{row}\n"));
                        }
                        out.push_str("Executed.\n");
                        out
                    }
                    Err(ExecuteError::Storage(err)) => return Err(err.into()),
                    Err(err) => execute_error_text(&err),
                }
            }
        };
        Ok(Response::Output(text))
    }

    pub fn close(self) -> Result<(), StorageError> {
        self.table.close()
    }
}

fn parse_error_text(err: &ParseError) -> String {
    match err {
        ParseError::Syntax => "Syntax error. Could not parse statement.\n".to_string(),
        ParseError::UnrecognizedStatement(line) => {
            format!("Unrecognized keyword at start of '{line}'.\n")
        }
        ParseError::UnrecognizedCommand(line) => format!("Unrecognized command '{line}'.\n"),
    }
}

fn execute_error_text(err: &ExecuteError) -> String {
    match err {
        ExecuteError::Validation(ValidationError::NegativeId(_)) => {
            "ID must be positive.\n".to_string()
        }
        ExecuteError::Validation(
            ValidationError::UsernameTooLong { .. } | ValidationError::EmailTooLong { .. },
        ) => "String is too long.\n".to_string(),
        ExecuteError::DuplicateKey(_) => "Error: Duplicate key.\n".to_string(),
        ExecuteError::TableFull { .. } => "Error: Table full.\n".to_string(),
        other => format!("Error: {other}.\n"),
    }
}

/// Prompt, read and execute lines until `.exit` or end of input, then close
/// the table.
pub fn run<P, R, W>(
    path: P,
    config: TableConfig,
    mut input: R,
    mut output: W,
) -> Result<(), SessionError>
where
    P: AsRef<Path>,
    R: BufRead,
    W: Write,
{
    let mut session = Session::open(path, config)?;
    let mut buf = Vec::new();
    loop {
        output.write_all(PROMPT.as_bytes())?;
        output.flush()?;

        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            debug!("end of input");
            break;
        }
        // Invalid UTF-8 becomes U+FFFD rather than ending the session.
        let line = String::from_utf8_lossy(&buf);
        let command = line.trim_end_matches(['\n', '\r']);
        match session.execute(command)? {
            Response::Output(text) => output.write_all(text.as_bytes())?,
            Response::Exit => break,
        }
    }
    output.flush()?;
    session.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Session {
        Session::open(dir.path().join("session.db"), TableConfig::default()).unwrap()
    }

    fn output(response: Response) -> String {
        match response {
            Response::Output(text) => text,
            Response::Exit => panic!("unexpected exit"),
        }
    }

    #[test]
    fn insert_and_select_text() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);

        assert_eq!(
            output(session.execute("insert 1 user1 person1@example.com").unwrap()),
            "Executed.\n"
        );
        assert_eq!(
            output(session.execute("select").unwrap()),
            "(1, user1, person1@example.com)\nExecuted.\n"
        );
    }

    #[test]
    fn error_texts() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);

        let cases = [
            ("insert -1 foo bar", "ID must be positive.\n"),
            ("insert 1 a", "Syntax error. Could not parse statement.\n"),
            ("update 1", "Unrecognized keyword at start of 'update 1'.\n"),
            (".foo", "Unrecognized command '.foo'.\n"),
            ("insert 4294967296 a b", "Error: id 4294967296 does not fit in 32 bits.\n"),
        ];
        for (line, want) in cases {
            assert_eq!(output(session.execute(line).unwrap()), want, "line: {line}");
        }

        session.execute("insert 1 a b").unwrap();
        assert_eq!(
            output(session.execute("insert 1 c d").unwrap()),
            "Error: Duplicate key.\n"
        );
    }

    #[test]
    fn exit_and_meta_commands() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir);

        assert_eq!(session.execute(".exit").unwrap(), Response::Exit);
        assert_eq!(
            output(session.execute(".btree").unwrap()),
            "Tree:\n- leaf (size 0)\n"
        );
        assert!(output(session.execute(".constants").unwrap())
            .starts_with("Constants:\nROW_SIZE: 291\n"));
    }
}
