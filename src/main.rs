//! Anime1 Downloader（Anime1 动画下载器）Rust 实现。
//!
//! 本 crate 负责：配置加载、链接收集与分类、单集解析、mp4/m3u8 下载与 ffmpeg 合并。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/临时目录清理等基础设施
//! - `network_parser`：站点 HTTP 访问（`SiteClient`）与 Cookie/请求头
//! - `anime_parser`：页面解析与影片命名
//! - `download`：下载流程编排（解析、单文件下载、分片工作池、合并）
//! - `ui`：命令行交互

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;

mod anime_parser;
mod base_system;
mod download;
mod network_parser;
mod ui;

use base_system::config::load_or_create_with_base;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use network_parser::network::Anime1Network;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "anime1-downloader")]
#[command(about = "Anime1 episode downloader")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 配置文件路径（默认 <data-dir>/config.yml）
    #[arg(long)]
    config: Option<String>,

    /// 数据目录路径（用于存放 config.yml 和 logs 等文件）
    #[arg(long)]
    data_dir: Option<String>,

    /// 链接文件路径，覆盖配置中的 urls_path
    #[arg(long)]
    urls: Option<String>,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("Anime1 Downloader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let log = init_logging(cli.debug, data_dir)?;
    info!(target: "startup", "当前版本: v{}，日志目录 {}", VERSION, log.logs_dir().display());

    let config_path = cli.config.as_deref().map(PathBuf::from);
    let mut config = load_or_create_with_base::<Config>(config_path.as_deref(), data_dir)
        .map_err(|e| anyhow!(e.to_string()))?;
    if let Some(urls) = cli.urls {
        config.urls_path = urls;
    }

    let root = config.default_save_dir();
    fs::create_dir_all(&root).with_context(|| format!("创建下载目录失败: {}", root.display()))?;

    let site = Anime1Network::new(&config)?;
    ui::noui::run(&config, &site)
}

fn init_logging(debug: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: true,
    };
    LogSystem::init_with_base(opts, base_dir).map_err(|e| anyhow!(e))
}
