//! Content identifiers derived from sampled file bytes.
//!
//! Files are identified by hashing their exact byte length together with a
//! bounded sample: the whole file when it fits in the sample window, a
//! centered window otherwise. The identifier doubles as a dedup key across
//! the wider system, so the derivation and encoding are normative and must
//! stay bit-exact with every other implementation of this CID space.

use std::fmt;
use std::io::SeekFrom;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Maximum number of bytes sampled from a file (1 MiB).
///
/// Files at or below this size are hashed in full; larger files contribute
/// exactly this many bytes taken from a window centered on the file.
pub const SAMPLE_WINDOW_BYTES: u64 = 1_048_576;

/// Version byte tagging the identifier encoding.
const CID_VERSION: u8 = 0x01;

/// Two-byte marker for the midhash sampling scheme, repeated twice in the
/// tagged structure.
const MIDHASH_MARKER: [u8; 2] = [0x80, 0x20];

/// Length marker byte: size of the SHA-256 digest that follows.
const DIGEST_LEN_MARKER: u8 = 0x20;

/// Lowercase RFC 4648 base32 alphabet, used without padding.
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Errors that can occur while deriving a content identifier.
#[derive(Debug, thiserror::Error)]
pub enum CidError {
    /// The file could not be opened or its sample window fully read.
    #[error("Failed to sample {path}: {source}")]
    Io {
        /// Path of the file being sampled
        path: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for content identifier operations.
pub type CidResult<T> = Result<T, CidError>;

/// Deterministic content identifier for a file.
///
/// Lowercase ASCII string of fixed structure: `b` followed by the base32
/// encoding of `[version][midhash marker x2][digest length][SHA-256 digest]`.
/// Independent of file name, path, and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Wraps an already-derived identifier string, e.g. one received from an
    /// upstream system.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Derives the identifier for the file at `path`.
    ///
    /// Reads at most [`SAMPLE_WINDOW_BYTES`] bytes regardless of file size.
    ///
    /// # Errors
    /// - `CidError::Io` - File cannot be opened or the sample window cannot
    ///   be fully read
    pub async fn from_file(path: &Path) -> CidResult<Self> {
        let io_err = |source| CidError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut file = File::open(path).await.map_err(io_err)?;
        let length = file.metadata().await.map_err(io_err)?.len();
        let sample = read_sample(&mut file, length).await.map_err(io_err)?;

        Ok(Self::from_length_and_sample(length, &sample))
    }

    /// Derives the identifier from a file length and its sample window.
    ///
    /// The caller is responsible for the sampling rule: `sample` must be the
    /// whole content when `length <= SAMPLE_WINDOW_BYTES` and the centered
    /// window otherwise.
    pub fn from_length_and_sample(length: u64, sample: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(length.to_be_bytes());
        hasher.update(sample);
        let digest = hasher.finalize();

        // 1 version + 2x2 marker + 1 length + 32 digest = 38 bytes
        let mut tagged = Vec::with_capacity(38);
        tagged.push(CID_VERSION);
        tagged.extend_from_slice(&MIDHASH_MARKER);
        tagged.extend_from_slice(&MIDHASH_MARKER);
        tagged.push(DIGEST_LEN_MARKER);
        tagged.extend_from_slice(&digest);

        let mut encoded = String::with_capacity(2 + tagged.len() * 8 / 5);
        encoded.push('b');
        encode_base32_lower(&tagged, &mut encoded);
        Self(encoded)
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the underlying string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the byte offset of the centered sample window for a file of
/// `length` bytes. Only meaningful when `length > SAMPLE_WINDOW_BYTES`.
pub fn sample_window_offset(length: u64) -> u64 {
    (length - SAMPLE_WINDOW_BYTES) / 2
}

/// Reads the sample window for a file of known length.
///
/// The file position is assumed to be at the start, as after open.
async fn read_sample(file: &mut File, length: u64) -> Result<Vec<u8>, std::io::Error> {
    if length <= SAMPLE_WINDOW_BYTES {
        let mut sample = Vec::with_capacity(length as usize);
        file.read_to_end(&mut sample).await?;
        Ok(sample)
    } else {
        file.seek(SeekFrom::Start(sample_window_offset(length)))
            .await?;
        let mut sample = vec![0u8; SAMPLE_WINDOW_BYTES as usize];
        file.read_exact(&mut sample).await?;
        Ok(sample)
    }
}

/// Encodes `bytes` into `out` as unpadded lowercase base32, 5 bits at a
/// time, most-significant-bit first. Trailing bits (< 5) are left-shifted to
/// fill the final symbol.
fn encode_base32_lower(bytes: &[u8], out: &mut String) {
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }

    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
}
