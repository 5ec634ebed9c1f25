use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Mode of files published with [`write_file_atomically`]: world readable, owner writable.
pub const PUBLISHED_FILE_MODE: u32 = 0o644;

/// Error that occurs when atomically replacing a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to write file `{path}` atomically: {source}")]
pub struct AtomicWriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Replaces the file at `path` with `contents` in a single rename.
///
/// The data goes to a temporary file next to `path`, is synced to disk and
/// gets [`PUBLISHED_FILE_MODE`] before it is renamed over `path`, so readers
/// see either the old or the new content. The temporary file is removed if
/// any step fails.
///
/// # Errors
///
/// Returns an [`AtomicWriteError`] if creating, writing, syncing or renaming
/// the temporary file fails.
///
/// # Example
/// ```no_run
/// # use bosh_exporter::fsutil;
/// fsutil::write_file_atomically("/var/lib/bosh_exporter/targets.json", b"[]")?;
/// # Ok::<(), fsutil::AtomicWriteError>(())
/// ```
pub fn write_file_atomically(
    path: impl AsRef<Path>,
    contents: &[u8],
) -> Result<(), AtomicWriteError> {
    let path = path.as_ref();
    let wrap = |source| AtomicWriteError {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)
        .map_err(wrap)?;
    tmp.write_all(contents).map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(PUBLISHED_FILE_MODE))
        .map_err(wrap)?;
    // On failure the temporary file is dropped, which deletes it.
    tmp.persist(path).map_err(|err| wrap(err.error))?;

    Ok(())
}
