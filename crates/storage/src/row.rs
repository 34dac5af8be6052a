//! Fixed-width row codec.
//!
//! Every row encodes to exactly [`ROW_SIZE`] bytes so a leaf cell has a
//! constant size and the per-page capacity is known statically.
//!
//! ```text
//! [0..4]    id: u32 (big-endian)
//! [4..36]   username, zero-padded
//! [36..291] email, zero-padded
//! ```

use std::fmt;

use crate::error::ValidationError;

/// Maximum username length in bytes.
pub const COLUMN_USERNAME_SIZE: usize = 32;
/// Maximum email length in bytes.
pub const COLUMN_EMAIL_SIZE: usize = 255;

pub const ID_SIZE: usize = 4;
pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + COLUMN_USERNAME_SIZE;
/// Encoded size of every row.
pub const ROW_SIZE: usize = ID_SIZE + COLUMN_USERNAME_SIZE + COLUMN_EMAIL_SIZE;

/// A record of the single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    /// Build a row from user input, rejecting anything that would not encode.
    pub fn new(
        id: i64,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if id < 0 {
            return Err(ValidationError::NegativeId(id));
        }
        let id = u32::try_from(id).map_err(|_| ValidationError::IdOutOfRange(id))?;
        let row = Self {
            id,
            username: username.into(),
            email: email.into(),
        };
        row.validate()?;
        Ok(row)
    }

    /// Check the text fields against their byte bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.len() > COLUMN_USERNAME_SIZE {
            return Err(ValidationError::UsernameTooLong {
                len: self.username.len(),
            });
        }
        if self.email.len() > COLUMN_EMAIL_SIZE {
            return Err(ValidationError::EmailTooLong {
                len: self.email.len(),
            });
        }
        // NUL is the padding byte; a value containing one would not decode back.
        if self.username.as_bytes().contains(&0) {
            return Err(ValidationError::EmbeddedNul { field: "username" });
        }
        if self.email.as_bytes().contains(&0) {
            return Err(ValidationError::EmbeddedNul { field: "email" });
        }
        Ok(())
    }

    /// Serialize into `buf`, overwriting every byte.
    pub fn encode(&self, buf: &mut [u8; ROW_SIZE]) -> Result<(), ValidationError> {
        self.validate()?;

        buf.fill(0);
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_be_bytes());
        let username = self.username.as_bytes();
        buf[USERNAME_OFFSET..USERNAME_OFFSET + username.len()].copy_from_slice(username);
        let email = self.email.as_bytes();
        buf[EMAIL_OFFSET..EMAIL_OFFSET + email.len()].copy_from_slice(email);
        Ok(())
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<[u8; ROW_SIZE], ValidationError> {
        let mut buf = [0u8; ROW_SIZE];
        self.encode(&mut buf)?;
        Ok(buf)
    }

    /// Deserialize a row previously written by [`Row::encode`].
    pub fn decode(buf: &[u8; ROW_SIZE]) -> Self {
        let mut id = [0u8; ID_SIZE];
        id.copy_from_slice(&buf[ID_OFFSET..ID_OFFSET + ID_SIZE]);
        let id = u32::from_be_bytes(id);
        Self {
            id,
            username: read_padded(&buf[USERNAME_OFFSET..USERNAME_OFFSET + COLUMN_USERNAME_SIZE]),
            email: read_padded(&buf[EMAIL_OFFSET..EMAIL_OFFSET + COLUMN_EMAIL_SIZE]),
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

/// Text up to the first NUL, or the whole field when it is full.
fn read_padded(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
