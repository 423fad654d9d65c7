//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::config::{ConfigSpec, FieldMeta};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 路径配置
    #[serde(default = "default_root_download_path")]
    pub root_download_path: String,
    #[serde(default = "default_urls_path")]
    pub urls_path: String,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    // 并发配置
    #[serde(default = "default_false")]
    pub use_multithreading: bool,
    #[serde(default = "default_episode_workers")]
    pub episode_workers: usize,
    #[serde(default = "default_segment_workers")]
    pub segment_workers: usize,

    // 命名配置
    #[serde(default = "default_seasons")]
    pub seasons: SeasonTable,

    // 网络配置
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    // 下载配置
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_min_file_size")]
    pub min_file_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_download_path: default_root_download_path(),
            urls_path: default_urls_path(),
            scratch_dir: default_scratch_dir(),
            use_multithreading: default_false(),
            episode_workers: default_episode_workers(),
            segment_workers: default_segment_workers(),
            seasons: default_seasons(),
            headers: default_headers(),
            request_timeout: default_request_timeout(),
            ffmpeg_path: default_ffmpeg_path(),
            min_file_size: default_min_file_size(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 11] = [
            FieldMeta {
                name: "root_download_path",
                description: "动画下载根目录",
            },
            FieldMeta {
                name: "urls_path",
                description: "待下载链接列表文件（每行一个，以 http 开头）；为空或不存在时改为交互输入",
            },
            FieldMeta {
                name: "scratch_dir",
                description: "m3u8 分片临时目录（每集使用独立子目录）",
            },
            FieldMeta {
                name: "use_multithreading",
                description: "是否同时下载多集",
            },
            FieldMeta {
                name: "episode_workers",
                description: "同时下载的集数（use_multithreading 开启时生效）",
            },
            FieldMeta {
                name: "segment_workers",
                description: "单集 m3u8 分片并发下载数",
            },
            FieldMeta {
                name: "seasons",
                description: "季度标记与季号对照表（按顺序匹配，第一个命中的生效）",
            },
            FieldMeta {
                name: "headers",
                description: "请求头（必须包含 user-agent）",
            },
            FieldMeta {
                name: "request_timeout",
                description: "单个请求超时时间（秒），0 表示不限制",
            },
            FieldMeta {
                name: "ffmpeg_path",
                description: "ffmpeg 可执行文件路径",
            },
            FieldMeta {
                name: "min_file_size",
                description: "下载完成后的最小文件大小（字节），小于该值视为失败并删除",
            },
        ];
        &FIELDS
    }

    fn validate(&self) -> Result<(), String> {
        if self.root_download_path.trim().is_empty() {
            return Err("root_download_path 不能为空".to_string());
        }
        if self.user_agent().trim().is_empty() {
            return Err("headers 中必须包含 user-agent".to_string());
        }
        if self.episode_workers == 0 || self.segment_workers == 0 {
            return Err("episode_workers / segment_workers 必须大于 0".to_string());
        }
        Ok(())
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        PathBuf::from(self.root_download_path.trim())
    }

    pub fn scratch_root(&self) -> PathBuf {
        PathBuf::from(self.scratch_dir.trim())
    }

    /// 大小写不敏感地查找 user-agent。
    pub fn user_agent(&self) -> &str {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("user-agent"))
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn client_timeout(&self) -> Option<Duration> {
        (self.request_timeout > 0).then(|| Duration::from_secs(self.request_timeout))
    }

    pub fn episode_pool_width(&self) -> usize {
        if self.use_multithreading {
            self.episode_workers.max(1)
        } else {
            1
        }
    }
}

/// 有序的「季度标记 → 季号」表。
///
/// YAML 中以 mapping 书写，反序列化时保留书写顺序。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeasonTable(Vec<(String, String)>);

impl SeasonTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for SeasonTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (marker, code) in &self.0 {
            map.serialize_entry(marker, code)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeasonCode {
    Text(String),
    Number(u64),
}

impl From<SeasonCode> for String {
    fn from(code: SeasonCode) -> Self {
        match code {
            SeasonCode::Text(s) => s.trim().to_string(),
            SeasonCode::Number(n) => n.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for SeasonTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = SeasonTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of season marker to season code")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(SeasonTable::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((marker, code)) = access.next_entry::<String, SeasonCode>()? {
                    if marker.is_empty() {
                        continue;
                    }
                    entries.push((marker, String::from(code)));
                }
                Ok(SeasonTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

// ── 默认值 ──────────────────────────────────────────────────────

fn default_false() -> bool {
    false
}

fn default_root_download_path() -> String {
    "downloads".to_string()
}

fn default_urls_path() -> String {
    "urls.txt".to_string()
}

fn default_scratch_dir() -> String {
    ".ts".to_string()
}

fn default_episode_workers() -> usize {
    4
}

fn default_segment_workers() -> usize {
    50
}

fn default_seasons() -> SeasonTable {
    SeasonTable::new([
        ("第二季", "2"),
        ("第三季", "3"),
        ("第四季", "4"),
        ("第五季", "5"),
        ("第六季", "6"),
        ("第七季", "7"),
        ("第八季", "8"),
        ("第九季", "9"),
        ("第十季", "10"),
    ])
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("user-agent".to_string(), DEFAULT_USER_AGENT.to_string())])
}

fn default_request_timeout() -> u64 {
    0
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_min_file_size() -> u64 {
    1024 * 1024
}
