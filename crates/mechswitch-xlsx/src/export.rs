use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::XlsxError;

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` is `Some("")` for bare file names like `foo.xlsx`.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// `<dir>/<stem>_new.<ext>` next to `input`; `.xlsx` when `input` has no extension.
pub fn output_path_for(input: impl AsRef<Path>) -> PathBuf {
    let input = input.as_ref();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xlsx".to_string());
    input.with_file_name(format!("{stem}_new.{ext}"))
}

/// Write `bytes` to `dest` through a synced temp file in the same directory,
/// renamed into place. On error `dest` is left untouched.
pub fn write_atomic(dest: impl AsRef<Path>, bytes: &[u8]) -> Result<(), XlsxError> {
    let dest = dest.as_ref();
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|err| XlsxError::Io(err.error))?;

    // Directory sync is best-effort; the file is already in place.
    if let Ok(dir) = fs::File::open(dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn derives_new_suffix_path() {
        assert_eq!(
            output_path_for("/data/switches.xlsx"),
            PathBuf::from("/data/switches_new.xlsx")
        );
        assert_eq!(
            output_path_for("inventory.v2.xlsm"),
            PathBuf::from("inventory.v2_new.xlsm")
        );
        assert_eq!(output_path_for("inventory"), PathBuf::from("inventory_new.xlsx"));
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.xlsx");
        fs::write(&dest, b"old").unwrap();

        write_atomic(&dest, b"new contents").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new contents");
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/deeper/out.xlsx");

        write_atomic(&dest, b"x").unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"x");
    }
}
