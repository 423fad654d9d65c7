//! 临时文件与分片缓存清理。

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

pub fn is_empty_dir(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    let mut entries = fs::read_dir(path)?;
    Ok(entries.next().is_none())
}

/// 删除整个目录；目录不存在视为成功。
pub fn remove_dir_quiet(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_dir_all(path) {
        Ok(()) => debug!("已清理目录 {}", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!("清理目录失败 {}: {}", path.display(), err),
    }
}

/// 所有分集的分片子目录清理完毕后，顺手移除空的分片根目录。
pub fn prune_scratch_root(root: impl AsRef<Path>) {
    let root = root.as_ref();
    if matches!(is_empty_dir(root), Ok(true)) {
        let _ = fs::remove_dir(root);
    }
}
