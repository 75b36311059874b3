//! In-memory, store-only zip assembly.

use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::error::Result;
use crate::model::FetchedFile;

/// Bodies above this size need zip64 headers.
const ZIP32_LIMIT: u64 = u32::MAX as u64;

/// Packs `files` into a zip archive without compression.
///
/// Entries appear in input order under their filenames verbatim; callers are
/// responsible for unique names.
///
/// # Errors
///
/// Returns an error if the zip writer rejects an entry.
pub fn build_archive(files: &[FetchedFile]) -> Result<Vec<u8>> {
    let capacity = files.iter().map(|f| f.bytes.len()).sum::<usize>();
    let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(capacity)));

    for file in files {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(file.bytes.len() as u64 >= ZIP32_LIMIT);
        zip.start_file(file.filename.as_str(), options)?;
        zip.write_all(&file.bytes)?;
    }

    let cursor = zip.finish()?;
    log::debug!(
        "Assembled archive: {} entries, {} bytes",
        files.len(),
        cursor.get_ref().len()
    );
    Ok(cursor.into_inner())
}
