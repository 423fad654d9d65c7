//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`：错误类型与数据模型（ResolvedMedia / SegmentManifest / RunSummary 等）
//! - `plan`：链接收集、分类与分类页展开
//! - `resolver`：单集页 → 媒体地址与 Cookie
//! - `progress`：共享的 CLI 进度条
//! - `progressive`：mp4 单文件下载
//! - `segment_pool`：m3u8 分片并发下载工作池
//! - `remux`：ffmpeg 合并
//! - `finalize`：临时文件校验与原子改名
//! - `downloader`：下载主流程编排

pub mod downloader;
pub mod finalize;
pub mod models;
pub mod plan;
pub mod progress;
pub mod progressive;
pub mod remux;
pub mod resolver;
pub mod segment_pool;
