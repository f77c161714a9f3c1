//! # 音频包与音频匹配
//!
//! 每个音频包是一组按音节命名的录音文件（如 `hao3.mp3`）。
//! 对一段读音，逐包统计缺失音节数，选缺失最少的包；并列时随机选一个。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::{Reading, Syllable, Tone, Token};
use crate::transform::trim_erhua;

// ============================================================
// 音频包
// ============================================================

#[derive(Debug, Clone)]
pub struct MediaPack {
    name: String,
    location: PathBuf,
    /// 小写文件名主干 → [(小写扩展名, 文件引用)]
    files: HashMap<String, Vec<(String, String)>>,
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

impl MediaPack {
    /// 由文件名列表构建；文件引用即原文件名
    pub fn new<I, S>(name: impl Into<String>, location: impl Into<PathBuf>, filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut files: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for filename in filenames {
            let filename = filename.as_ref();
            let Some((stem, ext)) = filename.rsplit_once('.') else {
                continue;
            };
            if stem.is_empty() {
                continue;
            }
            files
                .entry(stem.to_lowercase())
                .or_default()
                .push((normalize_extension(ext), filename.to_string()));
        }
        Self { name: name.into(), location: location.into(), files }
    }

    /// 扫描目录：每个子目录是一个音频包
    pub fn discover(directory: &Path) -> anyhow::Result<Vec<MediaPack>> {
        if !directory.is_dir() {
            warn!("[Media] {:?} is not a directory, no packs", directory);
            return Ok(Vec::new());
        }
        let mut packs = Vec::new();
        let entries = std::fs::read_dir(directory)
            .with_context(|| format!("listing media directory {:?}", directory))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let filenames: Vec<String> = std::fs::read_dir(&path)
                .with_context(|| format!("listing media pack {:?}", path))?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let pack = MediaPack::new(name, path.clone(), filenames);
            info!("[Media] pack {:?}: {} sounds", pack.name, pack.len());
            packs.push(pack);
        }
        packs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(packs)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 按扩展名优先级查找（不分大小写）
    pub fn lookup(&self, stem: &str, extensions: &[String]) -> Option<&str> {
        let variants = self.files.get(&stem.to_lowercase())?;
        extensions.iter().map(|e| normalize_extension(e)).find_map(|ext| {
            variants.iter().find(|(e, _)| *e == ext).map(|(_, reference)| reference.as_str())
        })
    }
}

// ============================================================
// 音频匹配
// ============================================================

/// 一个音节可接受的文件名主干，按优先级排列
pub fn candidate_stems(syllable: &Syllable) -> Vec<String> {
    let stem = syllable.stem().to_lowercase();
    let tone = syllable.tone().spoken();

    let mut base = vec![format!("{}{}", stem, tone.digit())];
    if tone == Tone::Neutral {
        base.push(stem.clone());
        base.push(format!("{}{}", stem, Tone::Falling.digit()));
    }

    let mut out = Vec::with_capacity(base.len() * 2);
    for candidate in base {
        let v_spelling = candidate.contains('ü').then(|| candidate.replace('ü', "v"));
        out.push(candidate);
        out.extend(v_spelling);
    }
    out
}

#[derive(Debug, Clone)]
pub struct AudioResolution<'p> {
    /// 选中的包；没有任何包时为 None
    pub pack: Option<&'p MediaPack>,
    /// 按读音顺序的文件引用
    pub files: Vec<String>,
    /// 选中包中未找到的音节数
    pub missing: usize,
}

impl AudioResolution<'_> {
    pub fn is_incomplete(&self) -> bool {
        self.missing > 0
    }
}

fn resolve_in_pack(syllables: &[&Syllable], pack: &MediaPack, extensions: &[String]) -> (Vec<String>, usize) {
    let mut files = Vec::new();
    let mut missing = 0;
    for syllable in syllables {
        let found = candidate_stems(syllable)
            .iter()
            .find_map(|stem| pack.lookup(stem, extensions));
        match found {
            Some(reference) => files.push(reference.to_string()),
            None => missing += 1,
        }
    }
    (files, missing)
}

/// 为读音选择音频包与文件列表
pub fn resolve_audio<'p, R: Rng + ?Sized>(
    reading: &Reading,
    packs: &'p [MediaPack],
    extensions: &[String],
    rng: &mut R,
) -> AudioResolution<'p> {
    let trimmed = trim_erhua(reading);
    let syllables: Vec<&Syllable> = trimmed
        .tokens()
        .filter_map(|t| match t {
            Token::Syllable(s) => Some(s),
            Token::Text(_) | Token::ToneChar(_) => None,
        })
        .collect();

    let results: Vec<(&MediaPack, Vec<String>, usize)> = packs
        .iter()
        .map(|pack| {
            let (files, missing) = resolve_in_pack(&syllables, pack, extensions);
            debug!("[Media] {}: {} missing", pack.name(), missing);
            (pack, files, missing)
        })
        .collect();

    let Some(best) = results.iter().map(|(_, _, missing)| *missing).min() else {
        return AudioResolution { pack: None, files: Vec::new(), missing: syllables.len() };
    };
    let winners: Vec<&(&MediaPack, Vec<String>, usize)> =
        results.iter().filter(|(_, _, missing)| *missing == best).collect();

    match winners.choose(rng) {
        Some((pack, files, missing)) => AudioResolution { pack: Some(*pack), files: files.clone(), missing: *missing },
        None => AudioResolution { pack: None, files: Vec::new(), missing: syllables.len() },
    }
}

/// `[sound:a.mp3][sound:b.mp3]`
pub fn sound_tags(files: &[String]) -> String {
    files.iter().map(|f| format!("[sound:{}]", f)).collect()
}

// ============================================================
// 测试
// ============================================================
