//! 隐藏临时文件与落盘。
//!
//! 下载中的数据只写入目标目录下以 `.` 开头的临时文件；通过大小校验后才以
//! 不覆盖的方式 rename 成最终文件名。

use std::io;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use tracing::debug;

use super::models::{DownloadError, EpisodeResult};

/// 在 `dest` 同目录创建 `.<文件名>.xxxxxx<suffix>` 临时文件。
pub(crate) fn hidden_temp(dest: &Path, suffix: &str) -> io::Result<NamedTempFile> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(suffix)
        .tempfile_in(dir)
}

/// 校验大小后把临时文件移到最终位置；过小的文件直接删除。
pub(crate) fn finalize(temp: TempPath, dest: &Path, min_size: u64) -> EpisodeResult<PathBuf> {
    let size = std::fs::metadata(&temp)?.len();
    if size < min_size {
        debug!("{} 仅 {} 字节，丢弃", dest.display(), size);
        drop(temp);
        return Err(DownloadError::TooSmall {
            path: dest.to_path_buf(),
            size,
        });
    }

    temp.persist_noclobber(dest).map_err(|err| {
        if dest.exists() {
            DownloadError::AlreadyExists(dest.to_path_buf())
        } else {
            DownloadError::Io(err.error)
        }
    })?;
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn temp_with(dest: &Path, bytes: &[u8]) -> TempPath {
        let mut tmp = hidden_temp(dest, ".part").unwrap();
        tmp.write_all(bytes).unwrap();
        tmp.into_temp_path()
    }

    #[test]
    fn temp_name_is_hidden_and_beside_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("A - 01.mp4");
        let tmp = hidden_temp(&dest, ".part").unwrap();
        let name = tmp.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".A - 01.mp4."));
        assert!(name.ends_with(".part"));
        assert_eq!(tmp.path().parent(), Some(dir.path()));
    }

    #[test]
    fn undersized_download_is_deleted() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("A - 01.mp4");
        let tmp = temp_with(&dest, &[0u8; 512]);
        let tmp_path = tmp.to_path_buf();

        let err = finalize(tmp, &dest, 1024 * 1024).unwrap_err();
        assert!(matches!(err, DownloadError::TooSmall { size: 512, .. }));
        assert!(!dest.exists());
        assert!(!tmp_path.exists());
    }

    #[test]
    fn valid_download_is_renamed_into_place() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("A - 01.mp4");
        let tmp = temp_with(&dest, &[7u8; 2048]);

        let out = finalize(tmp, &dest, 1024).unwrap();
        assert_eq!(out, dest);
        assert_eq!(fs::read(&dest).unwrap().len(), 2048);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn never_clobbers_existing_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("A - 01.mp4");
        fs::write(&dest, b"original").unwrap();
        let tmp = temp_with(&dest, &[1u8; 2048]);

        let err = finalize(tmp, &dest, 1024).unwrap_err();
        assert!(matches!(err, DownloadError::AlreadyExists(_)));
        assert_eq!(fs::read(&dest).unwrap(), b"original");
    }
}
