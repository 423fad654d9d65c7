//! 下载主流程：逐集解析、按媒体类型分派下载、汇总结果。
//!
//! 单集失败只记录在汇总中，不会中断其它分集。

use std::path::PathBuf;
use std::time::Instant;

use crossbeam_channel as channel;
use tracing::{error, info};

use super::models::{EpisodeOutcome, EpisodeResult, FailedEpisode, MediaKind, RunSummary};
use super::progress::ProgressBoard;
use super::progressive::download_mp4;
use super::resolver::resolve_episode;
use super::segment_pool::download_ts;
use crate::base_system::context::Config;
use crate::network_parser::network::{SiteClient, download_headers};

/// 下载单集，成功时返回最终文件路径。
pub fn download_episode(
    site: &dyn SiteClient,
    config: &Config,
    episode_url: &str,
    board: &ProgressBoard,
) -> EpisodeResult<PathBuf> {
    let media = resolve_episode(site, config, episode_url)?;
    let headers = download_headers(config, &media.cookie);
    let path = match media.kind {
        MediaKind::Progressive => download_mp4(site, config, &media, &headers, board)?,
        MediaKind::Segmented => download_ts(site, config, episode_url, &media, &headers, board)?,
    };
    info!("成功下载：{} → {}", media.title, path.display());
    Ok(path)
}

fn run_one(
    site: &dyn SiteClient,
    config: &Config,
    episode_url: &str,
    board: &ProgressBoard,
) -> EpisodeOutcome {
    match download_episode(site, config, episode_url, board) {
        Ok(path) => EpisodeOutcome::Done(path),
        Err(err) => {
            error!("失败：{}: {}", episode_url, err);
            EpisodeOutcome::Failed(FailedEpisode {
                url: episode_url.to_string(),
                reason: err.to_string(),
            })
        }
    }
}

/// 下载全部分集。
///
/// `use_multithreading` 关闭时按顺序执行；开启时最多 `episode_workers` 集并发。
/// 汇总中的成功/失败列表按输入顺序排列。
pub fn download_all(
    site: &dyn SiteClient,
    config: &Config,
    urls: &[String],
    board: &ProgressBoard,
) -> RunSummary {
    let start = Instant::now();
    let width = config.episode_pool_width().min(urls.len().max(1));
    info!("共 {} 集待下载，并发数 {}", urls.len(), width);

    let mut outcomes: Vec<(usize, EpisodeOutcome)> = if width <= 1 {
        urls.iter()
            .enumerate()
            .map(|(idx, url)| (idx, run_one(site, config, url, board)))
            .collect()
    } else {
        run_pool(site, config, urls, board, width)
    };
    outcomes.sort_by_key(|(idx, _)| *idx);

    let mut summary = RunSummary {
        attempted: urls.len(),
        ..RunSummary::default()
    };
    for (_, outcome) in outcomes {
        summary.record(outcome);
    }
    summary.elapsed = start.elapsed();
    info!(
        "下载结束：成功 {} 集，失败 {} 集，用时 {:.1}s",
        summary.succeeded.len(),
        summary.failed.len(),
        summary.elapsed.as_secs_f32()
    );
    summary
}

fn run_pool(
    site: &dyn SiteClient,
    config: &Config,
    urls: &[String],
    board: &ProgressBoard,
    width: usize,
) -> Vec<(usize, EpisodeOutcome)> {
    let (tx, rx) = channel::unbounded::<(usize, &str)>();
    for (idx, url) in urls.iter().enumerate() {
        let _ = tx.send((idx, url.as_str()));
    }
    drop(tx);

    let (done_tx, done_rx) = channel::unbounded::<(usize, EpisodeOutcome)>();
    std::thread::scope(|s| {
        for _ in 0..width {
            let rx = rx.clone();
            let done_tx = done_tx.clone();
            s.spawn(move || {
                for (idx, url) in rx.iter() {
                    let _ = done_tx.send((idx, run_one(site, config, url, board)));
                }
            });
        }
        drop(done_tx);
        done_rx.iter().take(urls.len()).collect()
    })
}
