//! 调用 ffmpeg 无损合并分片。

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use super::models::{DownloadError, EpisodeResult};

/// `ffmpeg -f concat -safe 0 -i <list> -c copy -f mp4 <output>`
pub fn concat_to_mp4(ffmpeg: &str, list: &Path, output: &Path) -> EpisodeResult<()> {
    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(["-f", "concat", "-safe", "0", "-i"])
        .arg(list)
        .args(["-c", "copy", "-f", "mp4"])
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    debug!("执行 {:?}", cmd);

    let out = cmd
        .output()
        .map_err(|e| DownloadError::Remux(format!("无法启动 {ffmpeg}：{e}")))?;
    if out.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&out.stderr);
    let tail = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
    let code = out
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    Err(DownloadError::Remux(format!("退出码 {code} {tail}").trim_end().to_string()))
}
