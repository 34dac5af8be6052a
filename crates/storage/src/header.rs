//! Database file header (stored in the first 100 bytes of page 0).
//!
//! Page 0 is never a tree node. Besides identifying the file, the header holds
//! the page number of the current root, which moves every time the root splits.

use crate::error::{Result, StorageError};

/// Magic bytes identifying a tabula database file.
pub const MAGIC: &[u8; 16] = b"tabula-db\0\0\0\0\0\0\0";

/// Page size in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 100;

/// The file header stored at the beginning of the database file (page 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Page size in bytes. Only [`PAGE_SIZE`] is supported.
    pub page_size: u32,
    /// Page number of the current root node (0 = tree not created yet).
    pub root_page: u32,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE as u32,
            root_page: 0,
        }
    }
}

impl FileHeader {
    /// Serialize the header into the first [`HEADER_SIZE`] bytes of `buf`.
    pub fn serialize(&self, buf: &mut [u8]) {
        assert!(buf.len() >= HEADER_SIZE, "buffer too small for header");
        buf[..HEADER_SIZE].fill(0);

        // Bytes 0..16: magic
        buf[0..16].copy_from_slice(MAGIC);
        // Bytes 16..20: page_size (big-endian)
        buf[16..20].copy_from_slice(&self.page_size.to_be_bytes());
        // Bytes 20..24: root_page
        buf[20..24].copy_from_slice(&self.root_page.to_be_bytes());
    }

    /// Deserialize a header from a buffer. Returns `None` if magic doesn't match.
    pub fn deserialize(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        if &buf[0..16] != MAGIC.as_slice() {
            return None;
        }
        let page_size = u32::from_be_bytes(buf[16..20].try_into().ok()?);
        let root_page = u32::from_be_bytes(buf[20..24].try_into().ok()?);
        Some(Self {
            page_size,
            root_page,
        })
    }

    /// Decode and check a header read from page 0.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let header = Self::deserialize(buf)
            .ok_or_else(|| StorageError::corrupt("invalid database header (bad magic)"))?;
        if header.page_size as usize != PAGE_SIZE {
            return Err(StorageError::Corrupt(format!(
                "unsupported page size {} (expected {})",
                header.page_size, PAGE_SIZE
            )));
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_header() {
        let header = FileHeader::default();
        let mut buf = [0u8; HEADER_SIZE];
        header.serialize(&mut buf);
        let decoded = FileHeader::deserialize(&buf).expect("should decode");
        assert_eq!(header, decoded);
    }

    #[test]
    fn root_page_survives_serialization() {
        let header = FileHeader {
            root_page: 42,
            ..FileHeader::default()
        };
        let mut buf = [0u8; HEADER_SIZE];
        header.serialize(&mut buf);
        assert_eq!(FileHeader::parse(&buf).unwrap().root_page, 42);
    }

    #[test]
    fn bad_magic_returns_none() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"bad!");
        assert!(FileHeader::deserialize(&buf).is_none());
        assert!(matches!(
            FileHeader::parse(&buf),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn too_short_returns_none() {
        let buf = [0u8; 10];
        assert!(FileHeader::deserialize(&buf).is_none());
    }

    #[test]
    fn foreign_page_size_is_rejected() {
        let header = FileHeader {
            page_size: 8192,
            root_page: 1,
        };
        let mut buf = [0u8; HEADER_SIZE];
        header.serialize(&mut buf);
        assert!(FileHeader::parse(&buf).is_err());
    }
}
