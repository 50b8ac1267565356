use std::fs;
use std::path::{Path, PathBuf};

/// Copies each source media path into the session's sandbox media
/// directory, returning the sandbox-local paths to hand to the agent turn.
/// A source that can't be read is skipped rather than failing the batch.
pub fn stage_media(sources: &[String], session_dir: &Path) -> std::io::Result<Vec<String>> {
    if sources.is_empty() {
        return Ok(Vec::new());
    }
    let media_dir = session_dir.join("media");
    fs::create_dir_all(&media_dir)?;

    let mut staged = Vec::with_capacity(sources.len());
    for src in sources {
        let src_path = Path::new(src);
        let Some(file_name) = src_path.file_name() else {
            continue;
        };
        let dest: PathBuf = media_dir.join(file_name);
        if fs::copy(src_path, &dest).is_ok() {
            staged.push(dest.to_string_lossy().to_string());
        }
    }
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn stages_existing_files_and_skips_missing_ones() {
        let src_dir = tempdir().unwrap();
        let dest_dir = tempdir().unwrap();

        let present = src_dir.path().join("photo.jpg");
        File::create(&present).unwrap().write_all(b"data").unwrap();
        let missing = src_dir.path().join("ghost.jpg");

        let staged = stage_media(
            &[present.to_string_lossy().to_string(), missing.to_string_lossy().to_string()],
            dest_dir.path(),
        )
        .unwrap();

        assert_eq!(staged.len(), 1);
        assert!(staged[0].ends_with("photo.jpg"));
    }

    #[test]
    fn empty_sources_stage_nothing_and_create_no_directory() {
        let dest_dir = tempdir().unwrap();
        let staged = stage_media(&[], dest_dir.path()).unwrap();
        assert!(staged.is_empty());
        assert!(!dest_dir.path().join("media").exists());
    }
}
