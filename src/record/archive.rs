//! Recording archive bundling
//!
//! A stopped recording is bundled into one deflate-compressed zip with
//! exactly two members under fixed names, so downstream tooling can unpack
//! any archive the same way regardless of session.

use std::fs::File;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::RecordError;

/// Archive member name of the metadata document
pub const METADATA_MEMBER: &str = "metadata.json";

/// Archive member name of the sample log
pub const DATA_MEMBER: &str = "samples.ndjson";

/// Bundle a session's metadata and sample log into `archive_path`
pub(super) fn bundle(
    archive_path: &Path,
    meta_path: &Path,
    data_path: &Path,
) -> Result<(), RecordError> {
    let file = File::create(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(METADATA_MEMBER, options)?;
    std::io::copy(&mut File::open(meta_path)?, &mut zip)?;

    zip.start_file(DATA_MEMBER, options)?;
    std::io::copy(&mut File::open(data_path)?, &mut zip)?;

    zip.finish()?;
    Ok(())
}
