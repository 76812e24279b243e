use std::io::Write;
use std::path::Path;

/// Atomically replace `dst` with `content` using the write-to-temp-then-rename
/// pattern.
///
/// The destination is never left in a partial state: either the rename lands
/// and `dst` holds the full new content, or `dst` keeps its previous content.
/// The parent directory must already exist.
pub fn atomic_write(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    // SEC-009: Use randomized temp filename to prevent TOCTOU race conditions.
    // An attacker cannot predict the temp path, so cannot create a symlink there
    // between our non-existent check and file creation.
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true) // Fails atomically if file exists (prevents symlink race)
        .open(&temp_path)?;

    let written = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);

    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if dst.exists() {
        if let Err(e) = std::fs::remove_file(dst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
    }

    if let Err(e) = std::fs::rename(&temp_path, dst) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    Ok(())
}
