//! Packaging of an entry's output directory into a uniquely named zip.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive IO error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to walk output directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A zip written to the artifacts directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Archive {
    /// Generated identifier, also the file stem.
    pub id: String,
    pub path: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Zip every file below `dir` into `<artifacts_dir>/<uuid>.zip`.
///
/// Entry names are relative to `dir` with `/` separators, in sorted order.
///
/// # Errors
///
/// Returns `ArchiveError` if `dir` cannot be walked or the zip cannot be written.
pub fn archive_dir(dir: &Path, artifacts_dir: &Path) -> Result<Archive, ArchiveError> {
    let entries = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    std::fs::create_dir_all(artifacts_dir).map_err(io_err(artifacts_dir))?;
    let id = uuid::Uuid::new_v4().to_string();
    let path = artifacts_dir.join(format!("{id}.zip"));
    let file = File::create(&path).map_err(io_err(&path))?;

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut files = 0usize;

    for entry in &entries {
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut input = File::open(entry.path()).map_err(io_err(entry.path()))?;
            io::copy(&mut input, &mut zip).map_err(io_err(entry.path()))?;
            files += 1;
        }
    }
    zip.finish()?;

    tracing::info!(%id, files, path = %path.display(), "archived output directory");
    Ok(Archive { id, path })
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn archives_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");
        std::fs::create_dir_all(output.join("passages")).unwrap();
        std::fs::write(output.join("document.json"), "{}").unwrap();
        std::fs::write(output.join("passages/0.txt"), "zero").unwrap();

        let archive = archive_dir(&output, &dir.path().join("artifacts")).unwrap();
        assert!(archive.path.ends_with(format!("{}.zip", archive.id)));

        let mut zip = zip::ZipArchive::new(File::open(&archive.path).unwrap()).unwrap();
        let mut names: Vec<_> = zip.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(names, vec!["document.json", "passages/", "passages/0.txt"]);

        let mut content = String::new();
        zip.by_name("passages/0.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "zero");
    }

    #[test]
    fn archive_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");
        std::fs::create_dir_all(&output).unwrap();
        let artifacts = dir.path().join("artifacts");
        let a = archive_dir(&output, &artifacts).unwrap();
        let b = archive_dir(&output, &artifacts).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = archive_dir(&dir.path().join("nope"), &dir.path().join("artifacts")).unwrap_err();
        assert!(matches!(err, ArchiveError::Walk(_)));
    }
}
