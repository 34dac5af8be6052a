//! Pager: page-level I/O with an in-memory page cache.
//!
//! The pager maps page numbers to fixed-size buffers. A page is read from disk
//! on first access and stays cached for the rest of the session; asking for the
//! page right after the last one allocates it. Nothing reaches the file until
//! a flush, except the header page of a freshly created database.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::config::TABLE_MAX_PAGES;
use crate::error::{Result, StorageError};
use crate::header::{FileHeader, PAGE_SIZE};

/// A page number (0-based). Page 0 contains the file header.
pub type PageNum = u32;

/// A single cached page.
struct Frame {
    data: Vec<u8>,
    /// Whether this page has been modified since last flush.
    dirty: bool,
}

/// Owns the database file and every page buffer loaded from it.
pub struct Pager {
    file: File,
    header: FileHeader,
    header_dirty: bool,
    /// Page cache: page_num -> frame.
    pool: HashMap<PageNum, Frame>,
    /// Highest allocated page number + 1.
    page_count: u32,
    max_pages: u32,
}

impl Pager {
    /// Open or create a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_max_pages(path, TABLE_MAX_PAGES)
    }

    /// Open or create a database file that may grow to at most `max_pages` pages.
    pub fn open_with_max_pages<P: AsRef<Path>>(path: P, max_pages: u32) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();
        if file_len % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupt(format!(
                "file length {} is not a whole number of {}-byte pages",
                file_len, PAGE_SIZE
            )));
        }
        let page_count = u32::try_from(file_len / PAGE_SIZE as u64)
            .map_err(|_| StorageError::corrupt("file has more pages than can be addressed"))?;

        let header = if page_count == 0 {
            // Write the initial header + fill page 0.
            let header = FileHeader::default();
            let mut page0 = vec![0u8; PAGE_SIZE];
            header.serialize(&mut page0);
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&page0)?;
            file.sync_all()?;
            header
        } else {
            let mut page0 = vec![0u8; PAGE_SIZE];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut page0)?;
            FileHeader::parse(&page0)?
        };

        debug!(
            path = %path.display(),
            page_count = page_count.max(1),
            max_pages,
            "opened pager"
        );

        Ok(Self {
            file,
            header,
            header_dirty: false,
            pool: HashMap::new(),
            page_count: page_count.max(1),
            max_pages,
        })
    }

    /// Returns a reference to the file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Returns a mutable reference to the file header.
    pub fn header_mut(&mut self) -> &mut FileHeader {
        self.header_dirty = true;
        &mut self.header
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    /// Returns the number of pages allocated so far, cached or on disk.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Returns the page limit this pager enforces.
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Whether `extra` more pages can be allocated without hitting the limit.
    pub fn has_room_for(&self, extra: u32) -> bool {
        u64::from(self.page_count) + u64::from(extra) <= u64::from(self.max_pages)
    }

    /// Return a page's data, loading or allocating it first if needed.
    pub fn read_page(&mut self, page_num: PageNum) -> Result<&[u8]> {
        let frame = self.load(page_num)?;
        Ok(&frame.data)
    }

    /// Get a mutable reference to a page's data. Marks the page as dirty.
    pub fn write_page(&mut self, page_num: PageNum) -> Result<&mut [u8]> {
        let frame = self.load(page_num)?;
        frame.dirty = true;
        Ok(&mut frame.data)
    }

    /// Allocate the next unused page and return its number.
    pub fn allocate_page(&mut self) -> Result<PageNum> {
        let page_num = self.page_count;
        self.load(page_num)?;
        Ok(page_num)
    }

    /// Write one cached page back to its slot in the file. Uncached pages are
    /// left alone.
    pub fn flush(&mut self, page_num: PageNum) -> Result<()> {
        if page_num == 0 && self.header_dirty {
            self.stage_header_page()?;
        }
        let Some(frame) = self.pool.get_mut(&page_num) else {
            return Ok(());
        };
        let offset = u64::from(page_num) * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&frame.data)?;
        frame.dirty = false;
        Ok(())
    }

    /// Flush the header and every dirty page to disk, then sync.
    pub fn flush_all(&mut self) -> Result<()> {
        if self.header_dirty {
            self.stage_header_page()?;
        }

        let mut dirty_pages: Vec<PageNum> = self
            .pool
            .iter()
            .filter(|(_, f)| f.dirty)
            .map(|(&pn, _)| pn)
            .collect();
        dirty_pages.sort_unstable();

        for &page_num in &dirty_pages {
            self.flush(page_num)?;
        }
        self.file.sync_all()?;
        debug!(pages = dirty_pages.len(), "flushed dirty pages");
        Ok(())
    }

    /// Stage the in-memory header into page 0 and mark the page dirty.
    fn stage_header_page(&mut self) -> Result<()> {
        let header = self.header.clone();
        let page = self.write_page(0)?;
        header.serialize(page);
        self.header_dirty = false;
        Ok(())
    }

    /// Return the cached frame for a page, reading it from disk or allocating
    /// it when it is the next unused page.
    fn load(&mut self, page_num: PageNum) -> Result<&mut Frame> {
        match self.pool.entry(page_num) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let frame = if page_num < self.page_count {
                    let mut data = vec![0u8; PAGE_SIZE];
                    let offset = u64::from(page_num) * PAGE_SIZE as u64;
                    self.file.seek(SeekFrom::Start(offset))?;
                    self.file.read_exact(&mut data)?;
                    Frame { data, dirty: false }
                } else if page_num == self.page_count {
                    if page_num >= self.max_pages {
                        return Err(StorageError::TableFull {
                            max_pages: self.max_pages,
                        });
                    }
                    self.page_count += 1;
                    debug!(page = page_num, "allocated page");
                    Frame {
                        data: vec![0u8; PAGE_SIZE],
                        dirty: true,
                    }
                } else {
                    return Err(StorageError::Corrupt(format!(
                        "page {} out of range (page_count={})",
                        page_num, self.page_count
                    )));
                };
                Ok(entry.insert(frame))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    fn temp_db() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pager.db");
        (dir, path)
    }

    #[test]
    fn create_new_database() {
        let (_dir, path) = temp_db();

        let pager = Pager::open(&path).unwrap();
        assert_eq!(pager.page_count(), 1);
        assert_eq!(pager.page_size(), PAGE_SIZE);
        assert_eq!(pager.header().root_page, 0);
        assert_eq!(fs::metadata(&path).unwrap().len(), PAGE_SIZE as u64);
    }

    #[test]
    fn reopen_existing_database() {
        let (_dir, path) = temp_db();

        {
            let mut pager = Pager::open(&path).unwrap();
            pager.allocate_page().unwrap();
            pager.flush_all().unwrap();
        }

        let pager = Pager::open(&path).unwrap();
        assert_eq!(pager.page_count(), 2);
    }

    #[test]
    fn read_write_page() {
        let (_dir, path) = temp_db();

        let mut pager = Pager::open(&path).unwrap();
        let pg = pager.allocate_page().unwrap();
        assert_eq!(pg, 1);

        {
            let data = pager.write_page(pg).unwrap();
            data[0..5].copy_from_slice(b"hello");
        }

        {
            let data = pager.read_page(pg).unwrap();
            assert_eq!(&data[0..5], b"hello");
        }
    }

    #[test]
    fn data_persists_across_reopen() {
        let (_dir, path) = temp_db();

        {
            let mut pager = Pager::open(&path).unwrap();
            let pg = pager.allocate_page().unwrap();
            let data = pager.write_page(pg).unwrap();
            data[0..6].copy_from_slice(b"world!");
            pager.flush_all().unwrap();
        }

        {
            let mut pager = Pager::open(&path).unwrap();
            let data = pager.read_page(1).unwrap();
            assert_eq!(&data[0..6], b"world!");
        }
    }

    #[test]
    fn next_slot_is_allocated_without_touching_disk() {
        let (_dir, path) = temp_db();

        let mut pager = Pager::open(&path).unwrap();
        let data = pager.read_page(1).unwrap();
        assert!(data.iter().all(|&b| b == 0));
        assert_eq!(pager.page_count(), 2);
        assert_eq!(fs::metadata(&path).unwrap().len(), PAGE_SIZE as u64);

        pager.flush(1).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 2 * PAGE_SIZE as u64);
    }

    #[test]
    fn allocate_multiple_pages() {
        let (_dir, path) = temp_db();

        let mut pager = Pager::open(&path).unwrap();
        let p1 = pager.allocate_page().unwrap();
        let p2 = pager.allocate_page().unwrap();
        let p3 = pager.allocate_page().unwrap();

        assert_eq!((p1, p2, p3), (1, 2, 3));
        assert_eq!(pager.page_count(), 4);
    }

    #[test]
    fn read_page_past_next_slot_is_rejected() {
        let (_dir, path) = temp_db();

        let mut pager = Pager::open(&path).unwrap();
        let result = pager.read_page(50);
        assert!(matches!(result, Err(StorageError::Corrupt(_))));
        assert_eq!(pager.page_count(), 1);
    }

    #[test]
    fn allocation_stops_at_max_pages() {
        let (_dir, path) = temp_db();

        let mut pager = Pager::open_with_max_pages(&path, 3).unwrap();
        assert!(pager.has_room_for(2));
        assert!(!pager.has_room_for(3));
        pager.allocate_page().unwrap();
        pager.allocate_page().unwrap();

        let result = pager.allocate_page();
        assert!(matches!(
            result,
            Err(StorageError::TableFull { max_pages: 3 })
        ));
        assert_eq!(pager.page_count(), 3);
    }

    #[test]
    fn header_survives_flush() {
        let (_dir, path) = temp_db();

        {
            let mut pager = Pager::open(&path).unwrap();
            pager.header_mut().root_page = 7;
            pager.allocate_page().unwrap();
            pager.allocate_page().unwrap();
            pager.flush_all().unwrap();
        }

        {
            let pager = Pager::open(&path).unwrap();
            assert_eq!(pager.header().root_page, 7);
            assert_eq!(pager.page_count(), 3);
        }
    }

    #[test]
    fn partial_page_file_is_corrupt() {
        let (_dir, path) = temp_db();
        fs::write(&path, vec![0u8; PAGE_SIZE + 10]).unwrap();

        let result = Pager::open(&path);
        assert!(matches!(result, Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn foreign_file_is_corrupt() {
        let (_dir, path) = temp_db();
        fs::write(&path, vec![0x55u8; PAGE_SIZE]).unwrap();

        assert!(matches!(
            Pager::open(&path),
            Err(StorageError::Corrupt(_))
        ));
    }
}
