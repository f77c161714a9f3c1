//! # 配置管理
//!
//! 从 exe 同目录（或命令行指定路径）的 `config.toml` 加载用户配置。
//! 文件不存在时使用默认值；缺省的键各自取默认。

use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{info, warn};
use serde::Deserialize;

use crate::dictionary::Script;
use crate::error::{Error, Result};
use crate::fields::Field;
use crate::transform::ColorBasis;

/// 顶层配置
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub reading: ReadingConfig,
    #[serde(default)]
    pub meaning: MeaningConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub reformat: ReformatConfig,
    #[serde(default = "default_weblinks")]
    pub weblinks: Vec<WebLink>,
}

/// 字典配置
#[derive(Debug, Deserialize, Clone)]
pub struct DictionaryConfig {
    /// 释义语言: en / de / fr / nl
    #[serde(default = "default_language")]
    pub language: String,
    /// 字典文件目录，相对路径按配置文件所在目录解析
    #[serde(default = "default_dictionary_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub script: Script,
}

fn default_language() -> String { "en".to_string() }
fn default_dictionary_directory() -> PathBuf { PathBuf::from("dictionaries") }

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            directory: default_dictionary_directory(),
            script: Script::default(),
        }
    }
}

/// 读音配置
#[derive(Debug, Deserialize, Clone)]
pub struct ReadingConfig {
    /// 输出声调符号而非数字
    #[serde(default = "default_true")]
    pub tonify: bool,
    #[serde(default = "default_true")]
    pub colorize: bool,
    /// 生成读音时应用三声变调
    #[serde(default = "default_true")]
    pub sandhi: bool,
    #[serde(default)]
    pub color_basis: ColorBasis,
    /// 一至五声的颜色
    #[serde(default = "default_tone_colors")]
    pub tone_colors: Vec<String>,
}

fn default_true() -> bool { true }

fn default_tone_colors() -> Vec<String> {
    ["#ff0000", "#ffaa00", "#00aa00", "#0000ff", "#545454"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            tonify: true,
            colorize: true,
            sandhi: true,
            color_basis: ColorBasis::default(),
            tone_colors: default_tone_colors(),
        }
    }
}

/// 多条释义的编号方式
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Numbering {
    /// ① ② ③
    #[default]
    Circled,
    /// 1. 2. 3.
    Arabic,
    None,
}

/// 多条释义的分隔方式
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    /// 每条一行 (`<br />`)
    #[default]
    Lines,
    Commas,
    Custom,
}

/// 释义配置
#[derive(Debug, Deserialize, Clone)]
pub struct MeaningConfig {
    #[serde(default)]
    pub numbering: Numbering,
    #[serde(default)]
    pub separator: Separator,
    #[serde(default = "default_custom_separator")]
    pub custom_separator: String,
    /// 释义中出现词条本身时替换为占位符
    #[serde(default = "default_true")]
    pub mask_hanzi: bool,
    #[serde(default = "default_mask_placeholder")]
    pub mask_placeholder: String,
    /// 量词单独放入 mw 字段
    #[serde(default = "default_true")]
    pub split_measure_words: bool,
    /// 字典无释义时调用在线翻译
    #[serde(default)]
    pub fallback_translation: bool,
    #[serde(default = "default_language")]
    pub translation_language: String,
    #[serde(default = "default_translation_timeout")]
    pub translation_timeout_secs: u64,
}

fn default_custom_separator() -> String { " | ".to_string() }
fn default_mask_placeholder() -> String { "㊥".to_string() }
fn default_translation_timeout() -> u64 { 5 }

impl Default for MeaningConfig {
    fn default() -> Self {
        Self {
            numbering: Numbering::default(),
            separator: Separator::default(),
            custom_separator: default_custom_separator(),
            mask_hanzi: true,
            mask_placeholder: default_mask_placeholder(),
            split_measure_words: true,
            fallback_translation: false,
            translation_language: default_language(),
            translation_timeout_secs: default_translation_timeout(),
        }
    }
}

impl MeaningConfig {
    /// 分隔符的实际文本
    pub fn separator_text(&self) -> &str {
        match self.separator {
            Separator::Lines => "<br />",
            Separator::Commas => ", ",
            Separator::Custom => &self.custom_separator,
        }
    }
}

/// 音频配置
#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    /// 按优先级排列的扩展名
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// 音频包目录，每个子目录是一个包
    #[serde(default = "default_media_directory")]
    pub media_directory: PathBuf,
}

fn default_extensions() -> Vec<String> {
    [".mp3", ".ogg", ".wav"].iter().map(|e| e.to_string()).collect()
}

fn default_media_directory() -> PathBuf { PathBuf::from("media") }

impl Default for AudioConfig {
    fn default() -> Self {
        Self { extensions: default_extensions(), media_directory: default_media_directory() }
    }
}

/// 用户修改字段后是否重新规整其格式
#[derive(Debug, Deserialize, Clone)]
pub struct ReformatConfig {
    #[serde(default = "default_true")]
    pub reading: bool,
    #[serde(default = "default_true")]
    pub meaning: bool,
    #[serde(default)]
    pub expression: bool,
}

impl Default for ReformatConfig {
    fn default() -> Self {
        Self { reading: true, meaning: true, expression: false }
    }
}

impl ReformatConfig {
    pub fn enabled(&self, field: Field) -> bool {
        match field {
            Field::Reading => self.reading,
            Field::Meaning => self.meaning,
            Field::Expression => self.expression,
            _ => false,
        }
    }
}

/// 外部词典链接，`{searchTerms}` 替换为词条
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WebLink {
    pub name: String,
    pub url: String,
}

fn default_weblinks() -> Vec<WebLink> {
    vec![
        WebLink {
            name: "MDBG".to_string(),
            url: "https://www.mdbg.net/chinese/dictionary?wdqb={searchTerms}".to_string(),
        },
        WebLink {
            name: "Wiktionary".to_string(),
            url: "https://en.wiktionary.org/wiki/{searchTerms}".to_string(),
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dictionary: DictionaryConfig::default(),
            reading: ReadingConfig::default(),
            meaning: MeaningConfig::default(),
            audio: AudioConfig::default(),
            reformat: ReformatConfig::default(),
            weblinks: default_weblinks(),
        }
    }
}

impl Config {
    /// 从 exe 同目录加载 config.toml，不存在或解析失败则用默认值
    pub fn load() -> Self {
        let config_path = Self::config_path();
        if !config_path.exists() {
            info!("[Config] config.toml 不存在, 使用默认配置");
            return Config::default();
        }
        match Self::from_path(&config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("[Config] {:#}, 使用默认配置", e);
                Config::default()
            }
        }
    }

    /// 读取指定文件；相对目录按文件所在目录解析
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {:?}", path))?;
        let mut cfg = Self::from_toml_str(&text)
            .with_context(|| format!("parsing config {:?}", path))?;
        if let Some(base) = path.parent() {
            cfg.rebase(base);
        }
        info!("[Config] 已加载 {:?}", path);
        info!(
            "[Config]   language={}, script={:?}, sandhi={}, packs in {:?}",
            cfg.dictionary.language, cfg.dictionary.script, cfg.reading.sandhi, cfg.audio.media_directory
        );
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.reading.tone_colors.len() != 5 {
            return Err(Error::Config(format!(
                "tone_colors needs 5 entries, got {}",
                self.reading.tone_colors.len()
            )));
        }
        if self.audio.extensions.is_empty() {
            return Err(Error::Config("audio.extensions is empty".to_string()));
        }
        Ok(())
    }

    fn rebase(&mut self, base: &Path) {
        if self.dictionary.directory.is_relative() {
            self.dictionary.directory = base.join(&self.dictionary.directory);
        }
        if self.audio.media_directory.is_relative() {
            self.audio.media_directory = base.join(&self.audio.media_directory);
        }
    }

    fn config_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join("config.toml")))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}
