//! 影片标题 → 媒体库路径。
//!
//! 标题格式为 `动画名称[集数]`，季度标记按配置表顺序识别。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::base_system::context::{Config, SeasonTable};
use crate::download::models::{DownloadError, EpisodeResult};

fn re_illegal() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("compile re_illegal"))
}

fn re_title() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(.*)\[(.*)\]").expect("compile re_title"))
}

/// 解析后的标题组成部分。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeName {
    pub anime: String,
    pub season: Option<String>,
    pub episode: String,
}

pub fn sanitize_video_name(video_name: &str) -> String {
    re_illegal().replace_all(video_name, "").into_owned()
}

/// 以最后一组 `[...]` 拆分出 (动画名称, 集数)。
pub fn parse_video_name(video_name: &str) -> EpisodeResult<(String, String)> {
    let caps = re_title()
        .captures(video_name)
        .ok_or_else(|| DownloadError::Format(video_name.to_string()))?;
    let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    let episode = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
    Ok((name.to_string(), episode.to_string()))
}

/// 找到第一个出现在名称中的季度标记，移除后返回 (季号, 新名称)。
pub fn extract_season(anime_name: &str, seasons: &SeasonTable) -> (Option<String>, String) {
    for (marker, code) in seasons.iter() {
        if anime_name.contains(marker) {
            let stripped = anime_name.replace(marker, "").trim().to_string();
            return (Some(code.to_string()), stripped);
        }
    }
    (None, anime_name.to_string())
}

pub fn split_title(title: &str, seasons: &SeasonTable) -> EpisodeResult<EpisodeName> {
    let clean = sanitize_video_name(title);
    let (name, episode) = parse_video_name(&clean)?;
    let (season, anime) = extract_season(&name, seasons);
    Ok(EpisodeName {
        anime,
        season,
        episode,
    })
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn numeric_label(s: &str) -> Option<u64> {
    if is_numeric(s) { s.parse().ok() } else { None }
}

fn season_folder(season: &str) -> String {
    match numeric_label(season) {
        Some(n) => format!("Season {n}"),
        None => format!("Season {season}"),
    }
}

/// 纯函数：只根据名称、季号、集数计算目标路径，不触碰文件系统。
pub fn format_video_path(root: &Path, name: &EpisodeName) -> PathBuf {
    let anime = name.anime.as_str();
    let episode_num = numeric_label(&name.episode);
    let episode_str = episode_num
        .map(|n| format!("{n:02}"))
        .unwrap_or_else(|| name.episode.clone());

    match (name.season.as_deref(), episode_num) {
        (Some(season), Some(_)) => root
            .join(anime)
            .join(season_folder(season))
            .join(format!("{anime} - S{season}E{episode_str}.mp4")),
        (Some(season), None) => root
            .join(anime)
            .join(season_folder(season))
            .join(format!("{anime} - S{season} - {episode_str}.mp4")),
        (None, Some(_)) => root
            .join(anime)
            .join("Season 1")
            .join(format!("{anime} - {episode_str}.mp4")),
        (None, None) => root.join(anime).join(format!("{anime} - {episode_str}.mp4")),
    }
}

/// 建立上层目录，目标已存在时直接失败。
pub fn prepare_destination(video_path: &Path) -> EpisodeResult<()> {
    if let Some(parent) = video_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if video_path.exists() {
        return Err(DownloadError::AlreadyExists(video_path.to_path_buf()));
    }
    Ok(())
}

/// 清理、解析标题并准备好下载目标路径。
pub fn process_video_name(config: &Config, title: &str) -> EpisodeResult<PathBuf> {
    let name = split_title(title, &config.seasons)?;
    let video_path = format_video_path(&config.default_save_dir(), &name);
    prepare_destination(&video_path)?;
    Ok(video_path)
}
