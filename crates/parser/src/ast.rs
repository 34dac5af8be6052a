/// A parsed input line: either a meta-command or a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Meta(MetaCommand),
    Statement(Statement),
}

/// Commands starting with `.` that act on the session rather than the table's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Exit,
    BTree,
    Constants,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `insert <id> <username> <email>`. The id is kept signed so range
    /// checks happen where the row is built.
    Insert {
        id: i64,
        username: String,
        email: String,
    },
    Select,
}
