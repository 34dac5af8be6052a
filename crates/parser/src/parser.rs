/// Line parser: splits a line into whitespace-separated words and turns them
/// into a [`Command`].
use crate::ast::*;
use crate::ParseError;

pub struct Parser<'a> {
    line: &'a str,
    words: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(line: &'a str) -> Self {
        let line = line.trim();
        Self {
            line,
            words: line.split_whitespace().collect(),
            pos: 0,
        }
    }

    pub fn parse_command(&mut self) -> Result<Command, ParseError> {
        if self.line.starts_with('.') {
            return self.parse_meta().map(Command::Meta);
        }
        self.parse_statement().map(Command::Statement)
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn advance(&mut self) -> Option<&'a str> {
        let word = self.words.get(self.pos).copied();
        self.pos += 1;
        word
    }

    fn expect_word(&mut self) -> Result<&'a str, ParseError> {
        self.advance().ok_or(ParseError::Syntax)
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        match self.advance() {
            None => Ok(()),
            Some(_) => Err(ParseError::Syntax),
        }
    }

    // ── Meta-commands ───────────────────────────────────────────────────

    fn parse_meta(&mut self) -> Result<MetaCommand, ParseError> {
        match self.line {
            ".exit" => Ok(MetaCommand::Exit),
            ".btree" => Ok(MetaCommand::BTree),
            ".constants" => Ok(MetaCommand::Constants),
            other => Err(ParseError::UnrecognizedCommand(other.to_string())),
        }
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.advance() {
            Some("insert") => self.parse_insert(),
            Some("select") => {
                self.expect_end()?;
                Ok(Statement::Select)
            }
            _ => Err(ParseError::UnrecognizedStatement(self.line.to_string())),
        }
    }

    fn parse_insert(&mut self) -> Result<Statement, ParseError> {
        let id = self
            .expect_word()?
            .parse::<i64>()
            .map_err(|_| ParseError::Syntax)?;
        let username = self.expect_word()?.to_string();
        let email = self.expect_word()?.to_string();
        self.expect_end()?;
        Ok(Statement::Insert {
            id,
            username,
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, ParseError> {
        Parser::new(line).parse_command()
    }

    #[test]
    fn test_meta_commands() {
        assert_eq!(parse(".exit").unwrap(), Command::Meta(MetaCommand::Exit));
        assert_eq!(parse(".btree").unwrap(), Command::Meta(MetaCommand::BTree));
        assert_eq!(
            parse(".constants").unwrap(),
            Command::Meta(MetaCommand::Constants)
        );
    }

    #[test]
    fn test_unknown_meta_command_keeps_line() {
        assert_eq!(
            parse(".tables"),
            Err(ParseError::UnrecognizedCommand(".tables".into()))
        );
        assert_eq!(
            parse(".exit now"),
            Err(ParseError::UnrecognizedCommand(".exit now".into()))
        );
    }

    #[test]
    fn test_insert() {
        assert_eq!(
            parse("insert 1 user1 person1@example.com").unwrap(),
            Command::Statement(Statement::Insert {
                id: 1,
                username: "user1".into(),
                email: "person1@example.com".into(),
            })
        );
    }

    #[test]
    fn test_insert_extra_whitespace() {
        assert_eq!(
            parse("  insert   7  a   b  ").unwrap(),
            Command::Statement(Statement::Insert {
                id: 7,
                username: "a".into(),
                email: "b".into(),
            })
        );
    }

    #[test]
    fn test_insert_negative_id_is_parsed() {
        match parse("insert -1 foo foo@example.com").unwrap() {
            Command::Statement(Statement::Insert { id, .. }) => assert_eq!(id, -1),
            other => panic!("expected Insert, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_syntax_errors() {
        for line in [
            "insert",
            "insert 1",
            "insert 1 user",
            "insert abc user email",
            "insert 1 user email extra",
            "insert 99999999999999999999 a b",
        ] {
            assert_eq!(parse(line), Err(ParseError::Syntax), "line: {line}");
        }
    }

    #[test]
    fn test_select() {
        assert_eq!(parse("select").unwrap(), Command::Statement(Statement::Select));
        assert_eq!(parse("select *"), Err(ParseError::Syntax));
    }

    #[test]
    fn test_unrecognized_statement() {
        assert_eq!(
            parse("delete 1"),
            Err(ParseError::UnrecognizedStatement("delete 1".into()))
        );
        assert_eq!(
            parse("INSERT 1 a b"),
            Err(ParseError::UnrecognizedStatement("INSERT 1 a b".into()))
        );
        assert_eq!(parse(""), Err(ParseError::UnrecognizedStatement(String::new())));
    }
}
