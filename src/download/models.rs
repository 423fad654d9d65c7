//! 下载相关的数据模型与错误定义。
//!
//! 包含解析后的媒体信息、分片清单、单集结果与整轮下载汇总。

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("影片名称格式不正确，应为 '动画名称[集数]'：{0}")]
    Format(String),
    #[error("文件已存在于 {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("页面解析失败：{0}")]
    Parse(String),
    #[error("无法解析 cookie：{0}")]
    CookieParse(String),
    #[error("无法取得影片链接：{0}")]
    Resolution(String),
    #[error("影片链接的扩展名不支持：{0}")]
    UnsupportedFormat(String),
    #[error("下载失败：{0}")]
    Transfer(String),
    #[error("{} 文件大小过小（{size} 字节）", path.display())]
    TooSmall { path: PathBuf, size: u64 },
    #[error("ffmpeg 转换失败：{0}")]
    Remux(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type EpisodeResult<T> = Result<T, DownloadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// 单个 mp4 文件
    Progressive,
    /// m3u8 分片流
    Segmented,
}

impl MediaKind {
    /// 按链接路径的扩展名判断媒体类型（忽略 query，大小写不敏感）。
    pub fn from_url(media_url: &str) -> EpisodeResult<Self> {
        let path = url::Url::parse(media_url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| media_url.split(['?', '#']).next().unwrap_or("").to_string());
        let file_name = path.rsplit('/').next().unwrap_or("");
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" => Ok(Self::Progressive),
            "m3u8" => Ok(Self::Segmented),
            _ => Err(DownloadError::UnsupportedFormat(if ext.is_empty() {
                media_url.to_string()
            } else {
                ext
            })),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub title: String,
    pub url: String,
    /// `e=..;p=..;h=..;`
    pub cookie: String,
    pub path: PathBuf,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub url: String,
}

/// 分片清单，声明顺序即合并顺序。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentManifest {
    pub source_url: String,
    pub segments: Vec<Segment>,
}

impl SegmentManifest {
    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Listing,
    Episode,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEpisode {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum EpisodeOutcome {
    Done(PathBuf),
    Failed(FailedEpisode),
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FailedEpisode>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn record(&mut self, outcome: EpisodeOutcome) {
        match outcome {
            EpisodeOutcome::Done(path) => self.succeeded.push(path),
            EpisodeOutcome::Failed(failed) => self.failed.push(failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_follows_path_extension() {
        assert_eq!(
            MediaKind::from_url("https://shiro.v.anime1.me/1234/1.mp4").unwrap(),
            MediaKind::Progressive
        );
        assert_eq!(
            MediaKind::from_url("https://shiro.v.anime1.me/1234/playlist.M3U8?t=1").unwrap(),
            MediaKind::Segmented
        );
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = MediaKind::from_url("https://host/video.webm").unwrap_err();
        assert!(matches!(err, DownloadError::UnsupportedFormat(ext) if ext == "webm"));
    }

    #[test]
    fn summary_splits_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(EpisodeOutcome::Done(PathBuf::from("a.mp4")));
        summary.record(EpisodeOutcome::Failed(FailedEpisode {
            url: "https://anime1.me/1".to_string(),
            reason: "boom".to_string(),
        }));
        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.failed.len(), 1);
    }
}
