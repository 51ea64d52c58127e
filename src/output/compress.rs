//! Batch file compression

use crate::error::Result;
use crate::types::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Path of the compressed sibling: `{path}{suffix}`
pub fn compressed_path(path: &Path, compression: Compression) -> PathBuf {
    let mut target = path.as_os_str().to_owned();
    target.push(compression.suffix());
    PathBuf::from(target)
}

/// Gzip `source` into a `.gz` sibling and return the sibling's path
///
/// The source file is left in place. A partially written sibling is
/// removed again when compression fails.
pub fn gzip_file(source: &Path) -> Result<PathBuf> {
    let target = compressed_path(source, Compression::Gzip);

    let mut reader = BufReader::new(File::open(source)?);
    if let Err(e) = write_gzip(&mut reader, &target) {
        match std::fs::remove_file(&target) {
            Err(remove) if remove.kind() != ErrorKind::NotFound => {
                tracing::warn!("Failed to remove {}: {remove}", target.display());
            }
            _ => {}
        }
        return Err(e.into());
    }

    tracing::debug!("Compressed {} to {}", source.display(), target.display());
    Ok(target)
}

fn write_gzip(reader: &mut impl Read, target: &Path) -> std::io::Result<()> {
    let mut encoder = GzEncoder::new(
        BufWriter::new(File::create(target)?),
        flate2::Compression::default(),
    );
    std::io::copy(reader, &mut encoder)?;
    encoder.finish()?.flush()
}

/// Apply `compression` to a finished batch file
///
/// Returns the file to upload and, when one was created, the compressed
/// sibling that must be removed afterwards.
pub fn compress_file(source: &Path, compression: Compression) -> Result<(PathBuf, Option<PathBuf>)> {
    match compression {
        Compression::None => Ok((source.to_path_buf(), None)),
        Compression::Gzip => {
            let target = gzip_file(source)?;
            Ok((target.clone(), Some(target)))
        }
    }
}
