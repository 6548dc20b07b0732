//! Opening script files: stdin, compressed files, progress tracking.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

const SMALL_BUFFER_SIZE: usize = 64 * 1024;
const LARGE_BUFFER_SIZE: usize = 256 * 1024;

/// Compression format detected from file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Compression {
    /// Detect compression format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("gz" | "gzip") => Compression::Gzip,
            Some("bz2" | "bzip2") => Compression::Bzip2,
            Some("xz" | "lzma") => Compression::Xz,
            Some("zst" | "zstd") => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Wrap a reader with the appropriate decompressor
    pub fn wrap_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => reader,
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
            Compression::Xz => write!(f, "xz"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

/// A reader wrapper that reports the running byte count to a callback.
pub struct ProgressReader<R: Read> {
    reader: R,
    callback: Box<dyn Fn(u64)>,
    bytes_read: u64,
}

impl<R: Read> ProgressReader<R> {
    pub fn new<F>(reader: R, callback: F) -> Self
    where
        F: Fn(u64) + 'static,
    {
        Self {
            reader,
            callback: Box::new(callback),
            bytes_read: 0,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.bytes_read += n as u64;
        (self.callback)(self.bytes_read);
        Ok(n)
    }
}

/// True if `path` means standard input
pub fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Size of the file on disk, if known. Progress is measured against it.
pub fn file_size(path: &Path) -> Option<u64> {
    if is_stdin(path) {
        return None;
    }
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Open a script for reading, decompressing by extension.
///
/// `-` reads standard input. `progress` receives the number of (compressed)
/// bytes read so far.
pub fn open_script(
    path: &Path,
    progress: Option<Box<dyn Fn(u64)>>,
) -> io::Result<Box<dyn BufRead>> {
    if is_stdin(path) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let file = File::open(path)?;
    let buffer_size = if file.metadata()?.len() > 1024 * 1024 * 1024 {
        LARGE_BUFFER_SIZE
    } else {
        SMALL_BUFFER_SIZE
    };

    let raw: Box<dyn Read> = match progress {
        Some(cb) => Box::new(ProgressReader::new(file, move |bytes| cb(bytes))),
        None => Box::new(file),
    };
    let reader = Compression::from_path(path).wrap_reader(raw)?;
    Ok(Box::new(BufReader::with_capacity(buffer_size, reader)))
}
