//! Video fingerprints used by subtitle providers to look up a file by its
//! exact byte identity.
//!
//! Two independent schemes are provided:
//! - the OpenSubtitles "movie hash": file size plus the wrapping sums of the
//!   little-endian `u64` words in the first and last 64 KiB;
//! - the SubDB hash: MD5 over the first 64 KiB followed by the last 64 KiB.
//!
//! For files shorter than 128 KiB the two windows overlap and the shared
//! bytes are counted twice. Lookup services index on exactly this value, so
//! the overlap must not be "fixed".

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, SubseekError};

/// Size of each hashed window
pub const CHUNK_SIZE: u64 = 64 * 1024;

const WORD_SIZE: usize = std::mem::size_of::<u64>();

/// Result of [`movie_hash_file`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieHash {
    /// Lowercase hexadecimal digest, no zero padding
    pub digest: String,
    /// File size in bytes, also sent alongside the digest by providers
    pub size: u64,
}

/// Compute the movie hash of the file at `path`.
pub fn movie_hash_file<P: AsRef<Path>>(path: P) -> Result<MovieHash> {
    let mut file = File::open(path.as_ref())?;
    let size = file.metadata()?.len();
    let digest = movie_hash(&mut file, size)?;
    Ok(MovieHash { digest, size })
}

/// Compute the movie hash of a seekable source whose total length is `size`.
pub fn movie_hash<R: Read + Seek>(reader: &mut R, size: u64) -> Result<String> {
    ensure_hashable(size)?;

    reader.seek(SeekFrom::Start(0))?;
    let head = sum_words(&read_window(reader)?);

    reader.seek(SeekFrom::End(-(CHUNK_SIZE as i64)))?;
    let tail = sum_words(&read_window(reader)?);

    Ok(format!("{:x}", size.wrapping_add(head).wrapping_add(tail)))
}

/// Compute the SubDB fingerprint of the file at `path`.
pub fn subdb_hash_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut file = File::open(path.as_ref())?;
    let size = file.metadata()?.len();
    subdb_hash(&mut file, size)
}

/// Compute the SubDB fingerprint of a seekable source whose total length is `size`.
pub fn subdb_hash<R: Read + Seek>(reader: &mut R, size: u64) -> Result<String> {
    ensure_hashable(size)?;

    let mut context = md5::Context::new();

    reader.seek(SeekFrom::Start(0))?;
    context.consume(read_window(reader)?);

    reader.seek(SeekFrom::End(-(CHUNK_SIZE as i64)))?;
    context.consume(read_window(reader)?);

    Ok(format!("{:x}", context.compute()))
}

/// Run a hash computation on the blocking thread pool
pub async fn hash_blocking<T, F>(compute: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(compute)
        .await
        .map_err(|e| SubseekError::Io(std::io::Error::other(e)))?
}

fn ensure_hashable(size: u64) -> Result<()> {
    if size < CHUNK_SIZE {
        return Err(SubseekError::FileTooSmall { size });
    }
    Ok(())
}

fn read_window<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; CHUNK_SIZE as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn sum_words(window: &[u8]) -> u64 {
    window
        .chunks_exact(WORD_SIZE)
        .map(|word| {
            let mut bytes = [0u8; WORD_SIZE];
            bytes.copy_from_slice(word);
            u64::from_le_bytes(bytes)
        })
        .fold(0u64, |acc, n| acc.wrapping_add(n))
}
