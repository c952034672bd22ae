use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Number;
use crate::error::{ClipdexError, Result};
use crate::vector_ops::Vector;

const MAGIC: [u8; 4] = *b"CDXV";
const FORMAT_VERSION: u32 = 1;

pub const VECTOR_FILE_EXTENSION: &str = "vec";
pub const IDENTIFIER_FILE_EXTENSION: &str = "txt";

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vector,
}

/// Ordered, build-once collection of embedded items.
///
/// Entries keep the order in which items were handed to the builder. Nothing
/// mutates an index after construction, so queries only ever borrow it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    entries: Vec<IndexEntry>,
    dimensions: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct VectorFileHeader {
    magic: [u8; 4],
    version: u32,
    rows: u64,
    dims: u32,
    checksum: [u8; 32],
}

impl Index {
    pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self> {
        let mut dimensions = None;
        for entry in &entries {
            let actual = entry.vector.len();
            match dimensions {
                Some(expected) if expected != actual => {
                    return Err(ClipdexError::DimensionMismatch { expected, actual });
                }
                _ => dimensions = Some(actual),
            }
        }
        Ok(Self {
            entries,
            dimensions,
        })
    }

    /// Embed every item in order.
    ///
    /// Items whose input is missing are logged and skipped. Any other
    /// embedding failure aborts the build and is returned unchanged.
    pub fn build<I, P, F>(items: I, mut embed_fn: F) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        F: FnMut(&Path) -> Result<Vector>,
    {
        let start = Instant::now();
        let mut entries = Vec::new();
        let mut skipped = 0;

        for item in items {
            let path = item.as_ref();
            match accept(path, embed_fn(path))? {
                Some(entry) => entries.push(entry),
                None => skipped += 1,
            }
        }

        let index = Self::from_entries(entries)?;
        info!(
            entries = index.len(),
            skipped,
            elapsed = ?start.elapsed(),
            "Index build complete"
        );
        Ok(index)
    }

    /// Same contract as [`Index::build`], but embeds on a pool of `workers`
    /// threads. Entry order still follows `items`, not completion order.
    pub fn build_parallel<P, F>(items: &[P], embed_fn: F, workers: usize) -> Result<Self>
    where
        P: AsRef<Path> + Sync,
        F: Fn(&Path) -> Result<Vector> + Sync,
    {
        let start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .build()?;

        let embedded: Vec<Result<Vector>> = pool.install(|| {
            items
                .par_iter()
                .map(|item| embed_fn(item.as_ref()))
                .collect()
        });

        let mut entries = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for (item, result) in items.iter().zip(embedded) {
            match accept(item.as_ref(), result)? {
                Some(entry) => entries.push(entry),
                None => skipped += 1,
            }
        }

        let index = Self::from_entries(entries)?;
        info!(
            entries = index.len(),
            skipped,
            workers,
            elapsed = ?start.elapsed(),
            "Parallel index build complete"
        );
        Ok(index)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }

    /// Persist as `<base>.vec` (header + row-major f32 payload) and
    /// `<base>.txt` (one identifier per line, same row order).
    pub fn save<P: AsRef<Path>>(&self, base: P) -> Result<()> {
        let base = base.as_ref();
        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.id.contains('\n') || entry.id.contains('\r'))
        {
            return Err(ClipdexError::InvalidIdentifier(entry.id.clone()));
        }

        if let Some(parent) = base.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let dims = self.dimensions.unwrap_or(0);
        let mut payload = Vec::with_capacity(self.len() * dims * size_of::<Number>());
        for entry in &self.entries {
            payload.extend(entry.vector.as_slice().iter().flat_map(|&num| num.to_le_bytes()));
        }

        let digest = Sha256::digest(&payload);
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&digest);

        let header = VectorFileHeader {
            magic: MAGIC,
            version: FORMAT_VERSION,
            rows: self.len() as u64,
            dims: dims as u32,
            checksum,
        };

        let vector_path = sibling(base, VECTOR_FILE_EXTENSION);
        let mut writer = BufWriter::new(File::create(&vector_path)?);
        bincode::serialize_into(&mut writer, &header)?;
        writer.write_all(&payload)?;
        writer.flush()?;

        let id_path = sibling(base, IDENTIFIER_FILE_EXTENSION);
        let mut writer = BufWriter::new(File::create(&id_path)?);
        for id in self.ids() {
            writeln!(writer, "{}", id)?;
        }
        writer.flush()?;

        info!(
            entries = self.len(),
            dims,
            path = %vector_path.display(),
            "Saved index"
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref();
        let vector_path = sibling(base, VECTOR_FILE_EXTENSION);
        let id_path = sibling(base, IDENTIFIER_FILE_EXTENSION);
        for path in [&vector_path, &id_path] {
            if !path.exists() {
                return Err(ClipdexError::InputNotFound(path.clone()));
            }
        }

        let identifiers: Vec<String> = fs::read_to_string(&id_path)?
            .lines()
            .map(str::to_string)
            .collect();

        let file = File::open(&vector_path)?;
        if file.metadata()?.len() == 0 {
            return Err(corrupt(&vector_path, "file is empty"));
        }
        let mmap = unsafe { Mmap::map(&file)? };

        let mut reader: &[u8] = &mmap[..];
        let header: VectorFileHeader = bincode::deserialize_from(&mut reader)
            .map_err(|e| corrupt(&vector_path, format!("unreadable header: {}", e)))?;
        let payload = reader;

        if header.magic != MAGIC {
            return Err(corrupt(&vector_path, "bad magic"));
        }
        if header.version != FORMAT_VERSION {
            return Err(corrupt(
                &vector_path,
                format!("unsupported format version {}", header.version),
            ));
        }

        let rows = usize::try_from(header.rows)
            .map_err(|_| corrupt(&vector_path, "row count overflows usize"))?;
        if rows != identifiers.len() {
            return Err(ClipdexError::RowCountMismatch {
                vectors: rows,
                identifiers: identifiers.len(),
            });
        }

        let dims = header.dims as usize;
        let row_bytes = dims * size_of::<Number>();
        let expected_len = rows
            .checked_mul(row_bytes)
            .ok_or_else(|| corrupt(&vector_path, "payload size overflows usize"))?;
        if payload.len() != expected_len {
            return Err(corrupt(
                &vector_path,
                format!(
                    "payload is {} bytes, expected {} ({} rows x {} dims)",
                    payload.len(),
                    expected_len,
                    rows,
                    dims
                ),
            ));
        }

        if Sha256::digest(payload).as_slice() != &header.checksum[..] {
            return Err(corrupt(&vector_path, "checksum mismatch"));
        }

        let entries = identifiers
            .into_iter()
            .enumerate()
            .map(|(row, id)| {
                let bytes = &payload[row * row_bytes..(row + 1) * row_bytes];
                let values = bytes
                    .chunks_exact(size_of::<Number>())
                    .map(|b| Number::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                IndexEntry {
                    id,
                    vector: Vector::from_normalized(values),
                }
            })
            .collect::<Vec<_>>();

        let index = Self {
            dimensions: if entries.is_empty() { None } else { Some(dims) },
            entries,
        };
        info!(entries = index.len(), dims, path = %vector_path.display(), "Loaded index");
        Ok(index)
    }
}

fn accept(path: &Path, result: Result<Vector>) -> Result<Option<IndexEntry>> {
    match result {
        Ok(vector) => {
            debug!(path = %path.display(), "Indexed");
            Ok(Some(IndexEntry {
                id: path.to_string_lossy().into_owned(),
                vector,
            }))
        }
        Err(ClipdexError::InputNotFound(missing)) => {
            warn!(path = %missing.display(), "Input not found, skipping");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn corrupt(path: &Path, reason: impl Into<String>) -> ClipdexError {
    ClipdexError::CorruptIndex {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// `<base>.<ext>`, appended rather than replacing any existing extension.
pub fn sibling(base: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// List files in `dir` whose extension is one of `extensions`
/// (case-insensitive), sorted by path.
pub fn discover_items<P: AsRef<Path>>(dir: P, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ClipdexError::InputNotFound(dir.to_path_buf()));
    }

    let mut items = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            items.push(path);
        }
    }
    items.sort();
    debug!(count = items.len(), dir = %dir.display(), "Discovered items");
    Ok(items)
}
