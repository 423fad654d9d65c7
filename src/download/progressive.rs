//! mp4 单文件下载。

use std::io::{Read, Write};
use std::path::PathBuf;

use indicatif::ProgressBar;
use reqwest::header::HeaderMap;
use tracing::debug;

use super::finalize::{finalize, hidden_temp};
use super::models::{DownloadError, EpisodeResult, ResolvedMedia};
use super::progress::ProgressBoard;
use crate::base_system::context::Config;
use crate::network_parser::network::{MediaStream, SiteClient};

const CHUNK_SIZE: usize = 10 * 1024;

pub fn download_mp4(
    site: &dyn SiteClient,
    config: &Config,
    media: &ResolvedMedia,
    headers: &HeaderMap,
    board: &ProgressBoard,
) -> EpisodeResult<PathBuf> {
    let stream = site.open_stream(&media.url, headers)?;
    if !stream.is_success() {
        return Err(DownloadError::Transfer(format!(
            "状态码：{}",
            stream.status
        )));
    }
    let total = stream
        .content_length
        .filter(|&len| len > 0)
        .ok_or_else(|| DownloadError::Transfer("Content-Length 为零，无法下载文件".to_string()))?;

    let file_name = media
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let bar = board.bytes_bar(&file_name, total);
    let written = stream_to_temp(stream, media, &bar);
    board.remove(&bar);

    let (temp, written) = written?;
    if written != total {
        return Err(DownloadError::Transfer(format!(
            "传输不完整：{written}/{total} 字节"
        )));
    }
    debug!("{} 下载完成，共 {} 字节", file_name, written);
    finalize(temp, &media.path, config.min_file_size)
}

fn stream_to_temp(
    mut stream: MediaStream,
    media: &ResolvedMedia,
    bar: &ProgressBar,
) -> EpisodeResult<(tempfile::TempPath, u64)> {
    let mut temp = hidden_temp(&media.path, ".part")?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = stream.body.read(&mut buf)?;
        if n == 0 {
            break;
        }
        temp.write_all(&buf[..n])?;
        written += n as u64;
        bar.inc(n as u64);
    }
    temp.flush()?;
    Ok((temp.into_temp_path(), written))
}
