use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Find files with a specific extension below a directory, sorted by path
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !Self::dir_exists(dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", dir));
        }
        let wanted = extension.trim_start_matches('.');

        let mut result = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if entry.file_type().is_file() {
                if let Some(ext) = path.extension() {
                    if ext.to_string_lossy().eq_ignore_ascii_case(wanted) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort();
        Ok(result)
    }

    // @generates: Output path mirroring the input's place in the input tree
    // @params: input_file, input_root, output_root
    pub fn mirror_path<P1, P2, P3>(input_file: P1, input_root: P2, output_root: P3) -> Result<PathBuf>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>,
        P3: AsRef<Path>,
    {
        let relative = input_file
            .as_ref()
            .strip_prefix(input_root.as_ref())
            .with_context(|| {
                format!(
                    "{:?} is not inside {:?}",
                    input_file.as_ref(),
                    input_root.as_ref()
                )
            })?;
        Ok(output_root.as_ref().join(relative))
    }

    /// Read a file as raw bytes
    pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        fs::read(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Read a file as raw bytes, refusing files larger than `limit`
    pub fn read_bytes_capped<P: AsRef<Path>>(path: P, limit: u64) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let size = fs::metadata(path)
            .with_context(|| format!("Failed to read file: {:?}", path))?
            .len();
        if size > limit {
            return Err(anyhow!("File is {} bytes, over the {} byte limit: {:?}", size, limit, path));
        }
        Self::read_bytes(path)
    }

    /// Write a file so that readers see either the old content or the new one.
    ///
    /// The content goes to a temporary file in the target directory, is
    /// flushed to disk and then renamed over the destination.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::ensure_dir(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp.write_all(content)
            .with_context(|| format!("Failed to write temporary file for {:?}", path))?;
        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to flush temporary file for {:?}", path))?;
        temp.persist(path)
            .map_err(|e| anyhow!("Failed to move output into place at {:?}: {}", path, e.error))?;

        Ok(())
    }
}
