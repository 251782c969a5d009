//! Demand-paged, file-backed page cache.
//!
//! Pages are loaded from disk the first time they are requested and held
//! for the lifetime of the pager; there is no eviction. `close` is the
//! single point where dirty pages are written back.
use crate::errors::{err, Error};
use crate::storage::node::{NodeView, PAGE_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, trace};

pub const MAX_PAGES: usize = 100;

pub struct Pager {
    file: File,
    file_length: u64,
    num_pages: u32,
    pages: heapless::Vec<Box<[u8; PAGE_SIZE]>, MAX_PAGES>,
}

impl Pager {
    /// Open (creating if absent) the database file at `path`.
    ///
    /// Fatal if the file's length is not an exact multiple of
    /// `PAGE_SIZE` — that means the file was truncated or is not one of
    /// ours.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let file_length = file.metadata()?.len();

        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Corrupt,
                "Db file is not a whole number of pages. Corrupt file."
            ));
        }

        let num_pages = (file_length / PAGE_SIZE as u64) as u32;
        debug!(num_pages, "opened pager");

        Ok(Self {
            file,
            file_length,
            num_pages,
            pages: heapless::Vec::new(),
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// The page number that a brand-new page should use.
    pub fn unused_page_num(&self) -> u32 {
        self.num_pages
    }

    fn validate_page_num(&self, page_num: u32) -> Result<(), Error> {
        if page_num as usize >= MAX_PAGES {
            return Err(err!(
                Corrupt,
                "Tried to fetch page number out of bounds. {} >= {}",
                page_num,
                MAX_PAGES
            ));
        }
        Ok(())
    }

    /// Return a mutable view of `page_num`, loading it from disk (or
    /// zero-initializing it) on first access.
    pub fn get_page(&mut self, page_num: u32) -> Result<NodeView<'_>, Error> {
        self.validate_page_num(page_num)?;

        let page_count_on_disk = (self.file_length / PAGE_SIZE as u64) as u32;
        while self.pages.len() <= page_num as usize {
            let slot_num = self.pages.len() as u32;
            let mut buf = Box::new([0u8; PAGE_SIZE]);
            if slot_num < page_count_on_disk {
                trace!(page_num = slot_num, "loading page from disk");
                self.file
                    .seek(SeekFrom::Start(slot_num as u64 * PAGE_SIZE as u64))?;
                self.file.read_exact(buf.as_mut())?;
            }
            if self.pages.push(buf).is_err() {
                return Err(err!(Corrupt, "Page cache exhausted."));
            }
        }

        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }

        Ok(NodeView::new(&mut self.pages[page_num as usize]))
    }

    /// Write `page_num`'s in-memory buffer back to disk.
    pub fn flush(&mut self, page_num: u32) -> Result<(), Error> {
        if page_num as usize >= self.pages.len() {
            return Err(err!(Corrupt, "Tried to flush null page."));
        }

        debug!(page_num, "flushing page");
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(self.pages[page_num as usize].as_ref())?;
        self.file.flush()?;
        self.file_length = self.file_length.max((page_num as u64 + 1) * PAGE_SIZE as u64);
        Ok(())
    }

    /// Flush every page that has been touched. Called once, at close.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        for page_num in 0..self.num_pages {
            self.flush(page_num)?;
        }
        Ok(())
    }
}
