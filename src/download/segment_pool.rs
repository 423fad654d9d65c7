//! m3u8 分片下载。
//!
//! 分片清单的声明顺序决定最终合并顺序：先按清单写出 concat 列表，再交给工作池并发下载，
//! 分片完成先后不影响输出。每集使用独立的分片目录（以单集链接的哈希命名），多集并发时不会互相覆盖。

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crossbeam_channel as channel;
use indicatif::ProgressBar;
use m3u8_rs::Playlist;
use reqwest::header::HeaderMap;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use super::finalize::{finalize, hidden_temp};
use super::models::{DownloadError, EpisodeResult, ResolvedMedia, Segment, SegmentManifest};
use super::progress::ProgressBoard;
use super::remux;
use crate::base_system::context::Config;
use crate::base_system::file_cleaner::remove_dir_quiet;
use crate::network_parser::network::SiteClient;

/// 依次尝试的画质。
pub const QUALITY_TIERS: [&str; 2] = ["1080p", "720p"];

const CONCAT_LIST: &str = "concat.txt";

// ── 清单 ──────────────────────────────────────────────────────────

pub fn fetch_manifest(
    site: &dyn SiteClient,
    media_url: &str,
    headers: &HeaderMap,
) -> EpisodeResult<SegmentManifest> {
    let mut last_status = 0u16;
    for tier in QUALITY_TIERS {
        let tier_url = media_url.replace("playlist", tier);
        let reply = site.get_text(&tier_url, headers)?;
        if reply.is_success() {
            debug!("使用 {} 画质: {}", tier, tier_url);
            return parse_manifest(&reply.body, &tier_url);
        }
        debug!("{} 画质不可用，状态码 {}", tier, reply.status);
        last_status = reply.status;
    }
    Err(DownloadError::Transfer(format!(
        "无法取得 m3u8，状态码：{last_status}"
    )))
}

fn segment_name(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("segment.ts")
        .to_string()
}

pub fn parse_manifest(body: &str, manifest_url: &str) -> EpisodeResult<SegmentManifest> {
    let playlist = match m3u8_rs::parse_playlist_res(body.as_bytes()) {
        Ok(Playlist::MediaPlaylist(pl)) => pl,
        Ok(Playlist::MasterPlaylist(_)) => {
            return Err(DownloadError::Transfer(
                "收到主播放列表而非分片清单".to_string(),
            ));
        }
        Err(_) => return Err(DownloadError::Transfer("m3u8 解析失败".to_string())),
    };

    let base = Url::parse(manifest_url)
        .map_err(|e| DownloadError::Transfer(format!("无效的 m3u8 链接 {manifest_url}: {e}")))?;

    let mut segments = Vec::with_capacity(playlist.segments.len());
    for seg in &playlist.segments {
        let url = base
            .join(seg.uri.trim())
            .map_err(|e| DownloadError::Transfer(format!("无效的分片地址 {}: {e}", seg.uri)))?;
        segments.push(Segment {
            name: segment_name(&seg.uri),
            url: url.to_string(),
        });
    }
    if segments.is_empty() {
        return Err(DownloadError::Transfer("m3u8 中没有分片".to_string()));
    }

    Ok(SegmentManifest {
        source_url: manifest_url.to_string(),
        segments,
    })
}

// ── 分片目录与 concat 列表 ─────────────────────────────────────────

pub fn scratch_dir_for(config: &Config, episode_url: &str) -> PathBuf {
    let digest = Sha256::digest(episode_url.as_bytes());
    let key = hex::encode(digest);
    config.scratch_root().join(&key[..16])
}

fn local_name(index: usize, seg: &Segment) -> String {
    let safe: String = seg
        .name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{index:05}_{safe}")
}

/// 按清单顺序写出 ffmpeg concat 列表，返回 (列表路径, 各分片本地路径)。
pub fn write_concat_list(
    manifest: &SegmentManifest,
    scratch: &Path,
) -> io::Result<(PathBuf, Vec<PathBuf>)> {
    let scratch = std::path::absolute(scratch)?;
    let locals: Vec<PathBuf> = manifest
        .segments
        .iter()
        .enumerate()
        .map(|(i, seg)| scratch.join(local_name(i, seg)))
        .collect();

    let list_path = scratch.join(CONCAT_LIST);
    let mut out = io::BufWriter::new(File::create(&list_path)?);
    for local in &locals {
        let quoted = local.to_string_lossy().replace('\'', r"'\''");
        writeln!(out, "file '{quoted}'")?;
    }
    out.flush()?;
    Ok((list_path, locals))
}

// ── 并发下载 ──────────────────────────────────────────────────────

fn fetch_segment(
    site: &dyn SiteClient,
    url: &str,
    dest: &Path,
    headers: &HeaderMap,
) -> EpisodeResult<()> {
    let mut stream = site.open_stream(url, headers)?;
    if !stream.is_success() {
        return Err(DownloadError::Transfer(format!(
            "分片 {url} 状态码：{}",
            stream.status
        )));
    }
    let mut file = File::create(dest)?;
    io::copy(&mut stream.body, &mut file)?;
    file.flush()?;
    Ok(())
}

/// 固定宽度的工作池；主线程按完成数推进进度，所有分片结束后汇总错误。
pub fn download_segments(
    site: &dyn SiteClient,
    jobs: Vec<(String, PathBuf)>,
    headers: &HeaderMap,
    workers: usize,
    bar: &ProgressBar,
) -> EpisodeResult<()> {
    let total = jobs.len();
    let worker_count = workers.clamp(1, total.max(1));

    let (tx, rx) = channel::unbounded::<(String, PathBuf)>();
    for job in jobs {
        let _ = tx.send(job);
    }
    drop(tx);

    let (done_tx, done_rx) = channel::unbounded::<EpisodeResult<()>>();
    let mut failures = Vec::new();

    std::thread::scope(|s| {
        for _ in 0..worker_count {
            let rx = rx.clone();
            let done_tx = done_tx.clone();
            s.spawn(move || {
                for (url, dest) in rx.iter() {
                    let _ = done_tx.send(fetch_segment(site, &url, &dest, headers));
                }
            });
        }
        drop(done_tx);

        for res in done_rx.iter().take(total) {
            match res {
                Ok(()) => bar.inc(1),
                Err(err) => failures.push(err.to_string()),
            }
        }
    });

    if failures.is_empty() {
        return Ok(());
    }
    for f in &failures {
        warn!("{}", f);
    }
    Err(DownloadError::Transfer(format!(
        "{}/{} 个分片下载失败，首个错误：{}",
        failures.len(),
        total,
        failures[0]
    )))
}

// ── 单集流程 ──────────────────────────────────────────────────────

pub fn download_ts(
    site: &dyn SiteClient,
    config: &Config,
    episode_url: &str,
    media: &ResolvedMedia,
    headers: &HeaderMap,
    board: &ProgressBoard,
) -> EpisodeResult<PathBuf> {
    let manifest = fetch_manifest(site, &media.url, headers)?;
    debug!("{} 共 {} 个分片", manifest.source_url, manifest.len());

    let scratch = scratch_dir_for(config, episode_url);
    remove_dir_quiet(&scratch);
    fs::create_dir_all(&scratch)?;

    let result = download_and_remux(site, config, &manifest, &scratch, media, headers, board);

    remove_dir_quiet(&scratch);
    result
}

fn download_and_remux(
    site: &dyn SiteClient,
    config: &Config,
    manifest: &SegmentManifest,
    scratch: &Path,
    media: &ResolvedMedia,
    headers: &HeaderMap,
    board: &ProgressBoard,
) -> EpisodeResult<PathBuf> {
    let (list_path, locals) = write_concat_list(manifest, scratch)?;
    let jobs = manifest
        .segments
        .iter()
        .map(|seg| seg.url.clone())
        .zip(locals)
        .collect();

    let file_name = media
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let bar = board.count_bar(&file_name, manifest.len() as u64);
    let fetched = download_segments(site, jobs, headers, config.segment_workers, &bar);
    board.remove(&bar);
    fetched?;

    let temp = hidden_temp(&media.path, ".mp4")?.into_temp_path();
    remux::concat_to_mp4(&config.ffmpeg_path, &list_path, &temp)?;
    finalize(temp, &media.path, config.min_file_size)
}
