//! Single-file tar transform used by stream-in and stream-out.
//!
//! The server reads and writes container files as tar streams. Stream-in
//! wraps one local file as a one-entry archive; stream-out copies the body of
//! the first entry of whatever archive the server returns.
//!
//! Both directions are blocking `Read`/`Write` transforms. Callers bridge
//! them onto async network streams.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{Archive, Builder, EntryType, Header};

/// Permission bits of packed entries.
const ENTRY_MODE: u32 = 0o644;

/// File content staged locally so its exact length is known before any
/// header is written.
#[derive(Debug)]
pub struct StagedFile {
    name: String,
    file: File,
    len: u64,
}

impl StagedFile {
    /// Entry name (base name only).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Body length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the staged body is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Writes the staged file as a single-entry tar archive.
    ///
    /// Fails with [`Error::IncompleteStream`] if the staged copy yields fewer
    /// bytes than were recorded when staging.
    pub fn write_archive<W: Write>(mut self, sink: W) -> Result<W> {
        self.file.seek(SeekFrom::Start(0))?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(self.len);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(unix_now());

        let mut body = ExactReader::new((&mut self.file).take(self.len), self.len);
        let mut builder = Builder::new(SealableSink::new(sink));
        let appended = builder.append_data(&mut header, &self.name, &mut body);

        if let Err(e) = appended {
            // Dropping the builder would write the end-of-archive marker,
            // which pads a short body out to its declared length.
            builder.get_mut().seal();
            if body.count < self.len {
                return Err(Error::IncompleteStream {
                    expected: self.len,
                    actual: body.count,
                });
            }
            return Err(e.into());
        }

        let sink = builder.into_inner()?.into_inner();
        tracing::debug!("packed {} ({} bytes)", self.name, self.len);
        Ok(sink)
    }
}

/// Stages `source` in a temporary file under the base name of `name`.
///
/// Nothing is emitted here; a source that cannot be read to the end fails
/// with [`Error::ArchiveFormat`].
pub fn stage<R: Read>(mut source: R, name: &str) -> Result<StagedFile> {
    let name = base_name(name)?;
    let mut file = tempfile::tempfile()?;

    let len = io::copy(&mut source, &mut file)
        .map_err(|e| Error::archive_format(format!("failed to read {name}: {e}")))?;
    file.flush()?;

    Ok(StagedFile { name, file, len })
}

/// Packs `source` as a single-entry archive named by the base of `name`.
pub fn pack<R: Read, W: Write>(source: R, name: &str, sink: W) -> Result<W> {
    stage(source, name)?.write_archive(sink)
}

/// Copies the body of the first archive entry to `sink`.
///
/// Later entries and trailing data are left unread. Returns the number of
/// bytes copied.
pub fn unpack_first_entry<R: Read, W: Write + ?Sized>(source: R, sink: &mut W) -> Result<u64> {
    let mut archive = Archive::new(source);
    let mut entries = archive
        .entries()
        .map_err(|e| Error::archive_format(e.to_string()))?;

    let mut entry = match entries.next() {
        Some(Ok(entry)) => entry,
        Some(Err(e)) => return Err(Error::archive_format(format!("invalid entry header: {e}"))),
        None => return Err(Error::archive_format("archive contains no entries")),
    };

    let expected = entry.size();
    let copied = io::copy(&mut entry, sink)?;
    if copied < expected {
        return Err(Error::IncompleteStream {
            expected,
            actual: copied,
        });
    }

    Ok(copied)
}

fn base_name(name: &str) -> Result<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::archive_format(format!("no file name in {name:?}")))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Reader that fails if its source ends before `expected` bytes.
struct ExactReader<R> {
    inner: R,
    expected: u64,
    count: u64,
}

impl<R> ExactReader<R> {
    fn new(inner: R, expected: u64) -> Self {
        Self {
            inner,
            expected,
            count: 0,
        }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() && self.count < self.expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source ended after {} of {} bytes", self.count, self.expected),
            ));
        }
        self.count += n as u64;
        Ok(n)
    }
}

/// Sink that refuses further writes once sealed.
struct SealableSink<W> {
    inner: W,
    sealed: bool,
}

impl<W> SealableSink<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            sealed: false,
        }
    }

    fn seal(&mut self) {
        self.sealed = true;
    }

    fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for SealableSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.sealed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "archive abandoned",
            ));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.sealed {
            return Ok(());
        }
        self.inner.flush()
    }
}
