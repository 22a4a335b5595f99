//! Length-prefixed, single-file repository (spec component F, §4.5/§6.2):
//! a fixed header, a fixed-size directory of entries, and a content region.
//! Single-writer, multi-reader — concurrent reads are safe, any mutation
//! requires the caller hold exclusive access to the `Repository`.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const MAGIC: u64 = 0x2d2e_2d2e_2d2e_2d2e;
const VERSION: u64 = 1;
const HEADER_SIZE: u64 = 32;
const NAME_SIZE: usize = 260;
const ENTRY_SIZE: u64 = (NAME_SIZE + 8 + 8 + 8 + 8 + 4) as u64;
const COMPACTION_BUFFER: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("bad magic or version in repository file")]
    BadFormat,
    #[error("name too long: {0}")]
    Overflow(String),
    #[error("entry not found: {0}")]
    NotFound(String),
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("invalid entry index: {0}")]
    InvalidIndex(usize),
}

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::Io { path: path.display().to_string(), source }
}

const FLAG_VALID: u32 = 0x0001;
const FLAG_DELETED: u32 = 0x0002;

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub offset: u64,
    pub size: u64,
    pub time_create: f64,
    pub time_access: f64,
    pub flags: u32,
}

impl Entry {
    pub fn is_valid(&self) -> bool {
        self.flags & FLAG_VALID != 0
    }

    pub fn is_deleted(&self) -> bool {
        self.flags & FLAG_DELETED != 0
    }

    fn to_bytes(&self) -> Result<[u8; ENTRY_SIZE as usize], Error> {
        if self.name.len() >= NAME_SIZE {
            return Err(Error::Overflow(self.name.clone()));
        }
        let mut buf = [0u8; ENTRY_SIZE as usize];
        let name_bytes = self.name.as_bytes();
        buf[..name_bytes.len()].copy_from_slice(name_bytes);
        let mut pos = NAME_SIZE;
        buf[pos..pos + 8].copy_from_slice(&self.offset.to_le_bytes());
        pos += 8;
        buf[pos..pos + 8].copy_from_slice(&self.size.to_le_bytes());
        pos += 8;
        buf[pos..pos + 8].copy_from_slice(&self.time_create.to_le_bytes());
        pos += 8;
        buf[pos..pos + 8].copy_from_slice(&self.time_access.to_le_bytes());
        pos += 8;
        buf[pos..pos + 4].copy_from_slice(&self.flags.to_le_bytes());
        Ok(buf)
    }

    fn from_bytes(buf: &[u8]) -> Self {
        let name_end = buf[..NAME_SIZE].iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        let name = String::from_utf8_lossy(&buf[..name_end]).into_owned();
        let mut pos = NAME_SIZE;
        let offset = u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let size = u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let time_create = f64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let time_access = f64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap());
        pos += 8;
        let flags = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        Self { name, offset, size, time_create, time_access, flags }
    }
}

#[derive(Debug, Clone, Copy)]
struct Header {
    max_entry_count: u64,
    used_entry_count: u64,
}

impl Header {
    fn to_bytes(self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[0..8].copy_from_slice(&MAGIC.to_le_bytes());
        buf[8..16].copy_from_slice(&VERSION.to_le_bytes());
        buf[16..24].copy_from_slice(&self.max_entry_count.to_le_bytes());
        buf[24..32].copy_from_slice(&self.used_entry_count.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let magic = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let version = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        if magic != MAGIC || version != VERSION {
            return Err(Error::BadFormat);
        }
        let max_entry_count = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        let used_entry_count = u64::from_le_bytes(buf[24..32].try_into().unwrap());
        Ok(Self { max_entry_count, used_entry_count })
    }
}

fn entry_region_offset() -> u64 {
    HEADER_SIZE
}

fn content_region_offset(max_entry_count: u64) -> u64 {
    HEADER_SIZE + max_entry_count * ENTRY_SIZE
}

/// A single-file, length-prefixed repository of named byte blobs.
pub struct Repository {
    path: PathBuf,
    file: File,
    header: Header,
    entries: Vec<Entry>,
}

impl Repository {
    /// Creates a fresh repository at `path`, overwriting any existing file,
    /// with room for `max_entry_count` directory entries.
    pub fn create(path: impl AsRef<Path>, max_entry_count: u64) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        let header = Header { max_entry_count, used_entry_count: 0 };
        file.write_all(&header.to_bytes()).map_err(|e| io_err(&path, e))?;
        let zero_entry = [0u8; ENTRY_SIZE as usize];
        for _ in 0..max_entry_count {
            file.write_all(&zero_entry).map_err(|e| io_err(&path, e))?;
        }
        file.flush().map_err(|e| io_err(&path, e))?;
        Ok(Self { path, file, header, entries: Vec::new() })
    }

    /// Opens an existing repository file, loading its header and directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path).map_err(|e| io_err(&path, e))?;
        let mut header_buf = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header_buf).map_err(|e| io_err(&path, e))?;
        let header = Header::from_bytes(&header_buf)?;

        let mut entries = Vec::with_capacity(header.used_entry_count as usize);
        let mut entry_buf = vec![0u8; ENTRY_SIZE as usize];
        file.seek(SeekFrom::Start(entry_region_offset())).map_err(|e| io_err(&path, e))?;
        for _ in 0..header.max_entry_count {
            file.read_exact(&mut entry_buf).map_err(|e| io_err(&path, e))?;
            let entry = Entry::from_bytes(&entry_buf);
            if entry.is_valid() {
                entries.push(entry);
            } else if entry.flags == 0 && entry.name.is_empty() {
                break;
            }
        }
        Ok(Self { path, file, header, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn next_content_offset(&self) -> u64 {
        self.entries.iter().filter(|e| !e.is_deleted()).map(|e| e.offset + e.size).max().unwrap_or(0)
    }

    /// Appends `bytes` under `name`. `name` must be shorter than 260 bytes.
    pub fn add(&mut self, name: &str, bytes: &[u8]) -> Result<(), Error> {
        if name.len() >= NAME_SIZE {
            return Err(Error::Overflow(name.to_string()));
        }
        if self.entries.len() as u64 >= self.header.max_entry_count {
            self.expand(self.header.max_entry_count * 2 + 1, 0)?;
        }
        let offset = self.next_content_offset();
        let absolute = content_region_offset(self.header.max_entry_count) + offset;
        self.file.seek(SeekFrom::Start(absolute)).map_err(|e| io_err(&self.path, e))?;
        self.file.write_all(bytes).map_err(|e| io_err(&self.path, e))?;

        let entry = Entry {
            name: name.to_string(),
            offset,
            size: bytes.len() as u64,
            time_create: 0.0,
            time_access: 0.0,
            flags: FLAG_VALID,
        };
        let index = self.entries.len();
        self.entries.push(entry);
        self.write_entry_at(index)?;
        self.header.used_entry_count += 1;
        self.write_header()
    }

    /// Reads the file at `path` fully into memory and adds it under its own
    /// file-name, or an explicit override.
    pub fn add_file(&mut self, path: impl AsRef<Path>, name: Option<&str>) -> Result<(), Error> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| io_err(path, e))?;
        let name = match name {
            Some(n) => n.to_string(),
            None => path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        };
        self.add(&name, &bytes)
    }

    fn find_index(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name && !e.is_deleted())
    }

    pub fn find(&self, name: &str) -> i64 {
        self.find_index(name).map(|i| i as i64).unwrap_or(-1)
    }

    pub fn find_entry(&self, name: &str) -> Option<&Entry> {
        self.find_index(name).map(|i| &self.entries[i])
    }

    pub fn exists(&self, name: &str) -> bool {
        self.find_index(name).is_some()
    }

    /// Reads the bytes of `name` into `out`; `out` must already be sized to
    /// the entry's byte count.
    pub fn read(&mut self, name: &str, out: &mut [u8]) -> Result<(), Error> {
        let index = self.find_index(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        let entry = &self.entries[index];
        if (out.len() as u64) < entry.size {
            return Err(Error::BufferTooSmall);
        }
        let absolute = content_region_offset(self.header.max_entry_count) + entry.offset;
        self.file.seek(SeekFrom::Start(absolute)).map_err(|e| io_err(&self.path, e))?;
        self.file.read_exact(&mut out[..entry.size as usize]).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    pub fn read_to_vec(&mut self, name: &str) -> Result<Vec<u8>, Error> {
        let index = self.find_index(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        let entry = self.entries[index].clone();
        let mut out = vec![0u8; entry.size as usize];
        self.read(name, &mut out)?;
        Ok(out)
    }

    pub fn read_to_file(&mut self, name: &str, dest: impl AsRef<Path>) -> Result<(), Error> {
        let dest = dest.as_ref();
        let bytes = self.read_to_vec(name)?;
        fs::write(dest, bytes).map_err(|e| io_err(dest, e))
    }

    /// Marks the entry named `name` deleted. On-disk bytes are untouched
    /// until a later `remove_entry_from_file` compaction.
    pub fn remove(&mut self, name: &str) -> Result<(), Error> {
        let index = self.find_index(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.remove_index(index)
    }

    pub fn remove_index(&mut self, index: usize) -> Result<(), Error> {
        let entry = self.entries.get_mut(index).ok_or(Error::InvalidIndex(index))?;
        entry.flags |= FLAG_DELETED;
        self.write_entry_at(index)
    }

    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().filter(|e| !e.is_deleted()).map(|e| e.name.as_str()).collect()
    }

    pub fn size(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_deleted()).count()
    }

    pub fn size_reserved(&self) -> u64 {
        self.header.max_entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn write_entry_at(&mut self, index: usize) -> Result<(), Error> {
        let entry_bytes = self.entries[index].to_bytes()?;
        let absolute = entry_region_offset() + (index as u64) * ENTRY_SIZE;
        self.file.seek(SeekFrom::Start(absolute)).map_err(|e| io_err(&self.path, e))?;
        self.file.write_all(&entry_bytes).map_err(|e| io_err(&self.path, e))
    }

    fn write_header(&mut self) -> Result<(), Error> {
        self.file.seek(SeekFrom::Start(0)).map_err(|e| io_err(&self.path, e))?;
        self.file.write_all(&self.header.to_bytes()).map_err(|e| io_err(&self.path, e))
    }

    /// Rewrites the header and every directory entry to disk, then flushes
    /// the OS-level file buffer.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.write_header()?;
        for index in 0..self.entries.len() {
            self.write_entry_at(index)?;
        }
        self.file.flush().map_err(|e| io_err(&self.path, e))
    }

    /// Grows the directory to hold `new_max` entries, shifting the content
    /// region forward by `(new_max - old_max) * entry_size` and rewriting
    /// every valid entry's absolute position. `slack` reserves additional
    /// headroom beyond `new_max` for future growth (currently unused beyond
    /// sizing the zero-padded directory).
    pub fn expand(&mut self, new_max: u64, slack: u64) -> Result<(), Error> {
        let new_max = new_max + slack;
        if new_max <= self.header.max_entry_count {
            return Ok(());
        }
        let old_content_start = content_region_offset(self.header.max_entry_count);
        let new_content_start = content_region_offset(new_max);
        let delta = new_content_start - old_content_start;

        let old_len = self.file.metadata().map_err(|e| io_err(&self.path, e))?.len();
        let content_len = old_len.saturating_sub(old_content_start);

        let mut buffer = vec![0u8; content_len as usize];
        self.file.seek(SeekFrom::Start(old_content_start)).map_err(|e| io_err(&self.path, e))?;
        self.file.read_exact(&mut buffer).map_err(|e| io_err(&self.path, e))?;
        self.file.seek(SeekFrom::Start(new_content_start)).map_err(|e| io_err(&self.path, e))?;
        self.file.write_all(&buffer).map_err(|e| io_err(&self.path, e))?;

        self.header.max_entry_count = new_max;
        self.write_header()?;
        let zero_entry = [0u8; ENTRY_SIZE as usize];
        self.file.seek(SeekFrom::Start(entry_region_offset() + self.entries.len() as u64 * ENTRY_SIZE)).map_err(|e| io_err(&self.path, e))?;
        for _ in self.entries.len() as u64..new_max {
            self.file.write_all(&zero_entry).map_err(|e| io_err(&self.path, e))?;
        }
        for index in 0..self.entries.len() {
            self.write_entry_at(index)?;
        }
        let _ = delta;
        self.file.flush().map_err(|e| io_err(&self.path, e))
    }

    /// Compacts the file: streams every non-deleted entry's content into a
    /// sibling temp file with recomputed offsets, then atomically renames it
    /// over the original. Uses a 1 MiB streaming buffer.
    pub fn remove_entry_from_file(&mut self) -> Result<(), Error> {
        let temp_path = self.path.with_extension("tmp");
        let mut temp_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| io_err(&temp_path, e))?;

        let header = Header { max_entry_count: self.header.max_entry_count, used_entry_count: 0 };
        temp_file.write_all(&header.to_bytes()).map_err(|e| io_err(&temp_path, e))?;
        let zero_entry = [0u8; ENTRY_SIZE as usize];
        for _ in 0..self.header.max_entry_count {
            temp_file.write_all(&zero_entry).map_err(|e| io_err(&temp_path, e))?;
        }

        let content_start = content_region_offset(self.header.max_entry_count);
        let mut new_entries = Vec::new();
        let mut write_offset = 0u64;
        let mut stream_buf = vec![0u8; COMPACTION_BUFFER];

        for entry in self.entries.iter().filter(|e| !e.is_deleted()) {
            let source_absolute = content_start + entry.offset;
            self.file.seek(SeekFrom::Start(source_absolute)).map_err(|e| io_err(&self.path, e))?;
            let mut remaining = entry.size;
            while remaining > 0 {
                let chunk = remaining.min(COMPACTION_BUFFER as u64) as usize;
                self.file.read_exact(&mut stream_buf[..chunk]).map_err(|e| io_err(&self.path, e))?;
                temp_file.write_all(&stream_buf[..chunk]).map_err(|e| io_err(&temp_path, e))?;
                remaining -= chunk as u64;
            }
            new_entries.push(Entry {
                name: entry.name.clone(),
                offset: write_offset,
                size: entry.size,
                time_create: entry.time_create,
                time_access: entry.time_access,
                flags: FLAG_VALID,
            });
            write_offset += entry.size;
        }

        let header = Header { max_entry_count: self.header.max_entry_count, used_entry_count: new_entries.len() as u64 };
        temp_file.seek(SeekFrom::Start(0)).map_err(|e| io_err(&temp_path, e))?;
        temp_file.write_all(&header.to_bytes()).map_err(|e| io_err(&temp_path, e))?;
        for (index, entry) in new_entries.iter().enumerate() {
            let bytes = entry.to_bytes()?;
            let absolute = entry_region_offset() + (index as u64) * ENTRY_SIZE;
            temp_file.seek(SeekFrom::Start(absolute)).map_err(|e| io_err(&temp_path, e))?;
            temp_file.write_all(&bytes).map_err(|e| io_err(&temp_path, e))?;
        }
        temp_file.flush().map_err(|e| io_err(&temp_path, e))?;
        drop(temp_file);

        fs::rename(&temp_path, &self.path).map_err(|e| io_err(&self.path, e))?;
        self.file = OpenOptions::new().read(true).write(true).open(&self.path).map_err(|e| io_err(&self.path, e))?;
        self.header = header;
        self.entries = new_entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_add_flush_open_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.repo");

        let mut repo = Repository::create(&path, 4).unwrap();
        repo.add("a", b"AAA").unwrap();
        repo.add("b", b"BBBB").unwrap();
        repo.flush().unwrap();
        drop(repo);

        let mut reopened = Repository::open(&path).unwrap();
        assert_eq!(reopened.list(), vec!["a", "b"]);
        let mut out = vec![0u8; 4];
        reopened.read("b", &mut out).unwrap();
        assert_eq!(out, b"BBBB");
    }

    #[test]
    fn remove_and_compact_drops_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.repo");

        let mut repo = Repository::create(&path, 4).unwrap();
        repo.add("a", b"AAA").unwrap();
        repo.add("b", b"BBBB").unwrap();
        repo.flush().unwrap();
        repo.remove("a").unwrap();
        repo.remove_entry_from_file().unwrap();

        assert_eq!(repo.list(), vec!["b"]);
        let mut out = vec![0u8; 4];
        repo.read("b", &mut out).unwrap();
        assert_eq!(out, b"BBBB");
        assert!(!repo.exists("a"));
    }

    #[test]
    fn expand_grows_directory_and_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.repo");

        let mut repo = Repository::create(&path, 1).unwrap();
        repo.add("a", b"AAA").unwrap();
        repo.flush().unwrap();
        repo.expand(8, 0).unwrap();
        repo.add("b", b"BBBB").unwrap();
        repo.flush().unwrap();

        let mut out = vec![0u8; 3];
        repo.read("a", &mut out).unwrap();
        assert_eq!(out, b"AAA");
        assert_eq!(repo.size_reserved(), 8);
    }

    #[test]
    fn read_missing_name_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.repo");
        let mut repo = Repository::create(&path, 2).unwrap();
        let mut out = Vec::new();
        assert!(matches!(repo.read("missing", &mut out), Err(Error::NotFound(_))));
    }

    #[test]
    fn open_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.repo");
        fs::write(&path, [0u8; 64]).unwrap();
        assert!(matches!(Repository::open(&path), Err(Error::BadFormat)));
    }

    #[test]
    fn name_too_long_is_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.repo");
        let mut repo = Repository::create(&path, 2).unwrap();
        let long_name = "x".repeat(300);
        assert!(matches!(repo.add(&long_name, b"data"), Err(Error::Overflow(_))));
    }
}
