//! # 词典
//!
//! 读取 CEDICT 格式的词表（`繁体 简体 [拼音] /释义1/释义2/`），
//! 按优先级合并：语言词典 < 补充词典 < 用户词典，后加载的覆盖先加载的。
//!
//! ## 提供
//! - 贪心最长匹配分词 → `Reading`
//! - 开头词条的释义 + 量词拆分
//! - 简繁转换

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;

use crate::model::{Reading, Token, Word};
use crate::pinyin::{self, SyllableTable};

/// 量词释义前缀
pub const MEASURE_WORD_MARKERS: &[&str] = &["CL:", "MW:"];

/// 补充词典与用户词典的文件名
pub const SUPPLEMENTARY_FILE: &str = "dict-supplementary.txt";
pub const USER_FILE: &str = "dict-user.txt";

/// 字形偏好
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    #[default]
    Simplified,
    Traditional,
}

// ============================================================
// 词条
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub traditional: String,
    pub simplified: String,
    /// 词条自身的读音
    pub reading: Word,
    /// 未要求释义时为 None
    pub meanings: Option<Vec<String>>,
}

impl Entry {
    pub fn script(&self, script: Script) -> &str {
        match script {
            Script::Simplified => &self.simplified,
            Script::Traditional => &self.traditional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureWord {
    pub hanzi: String,
    /// 原始数字调拼音，可能为空
    pub pinyin: String,
}

impl MeasureWord {
    pub fn new(hanzi: impl Into<String>, pinyin: impl Into<String>) -> Self {
        Self { hanzi: hanzi.into(), pinyin: pinyin.into() }
    }
}

/// 一个词条的释义，量词可单独拆出
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Meanings {
    pub glosses: Vec<String>,
    pub measure_words: Vec<MeasureWord>,
}

/// 分词结果单元
#[derive(Debug, Clone, Copy)]
pub enum Segment<'d, 't> {
    Known { text: &'t str, entry: &'d Entry },
    Unknown(char),
}

// ============================================================
// 文本辅助
// ============================================================

fn entry_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\S+)\s+(\S+)\s+\[([^\]]*)\]\s+/(.*)/\s*$").expect("entry line pattern")
    })
}

fn html_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("html tag pattern"))
}

fn hanzi_pair() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\p{Han}+)\|(\p{Han}+)").expect("hanzi pair pattern"))
}

fn measure_word_item() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^\[\]|]+)(?:\|([^\[\]|]+))?(?:\[([^\]]*)\])?$").expect("measure word pattern")
    })
}

/// 去掉 HTML 标签并还原常见实体
pub fn strip_html(text: &str) -> String {
    html_tag()
        .replace_all(text, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// CJK 统一表意文字（含扩展区）
pub fn is_hanzi(ch: char) -> bool {
    matches!(ch,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2CEAF}'
        | '\u{F900}'..='\u{FAFF}'
    )
}

const CJK_PUNCTUATION: &str = "。，、；：？！…—·「」『』《》〈〉（）【】〔〕“”‘’～";

fn is_punctuation_char(ch: char) -> bool {
    ch.is_ascii_punctuation() || CJK_PUNCTUATION.contains(ch)
}

/// 整个 Word 都是标点文本
fn is_punctuation(word: &Word) -> bool {
    !word.is_empty()
        && word.iter().all(|t| match t {
            Token::Text(text) => text.text().chars().all(is_punctuation_char),
            Token::Syllable(_) | Token::ToneChar(_) => false,
        })
}

/// `繁|简` 对按字形偏好取其一
fn resolve_pairs(text: &str, script: Script) -> String {
    let pick = match script {
        Script::Traditional => "$1",
        Script::Simplified => "$2",
    };
    hanzi_pair().replace_all(text, pick).into_owned()
}

/// `CL:個|个[ge4],本[ben3]` → [(个, ge4), (本, ben3)]
fn parse_measure_words(list: &str, script: Script) -> Vec<MeasureWord> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| {
            let caps = measure_word_item().captures(item)?;
            let first = caps.get(1)?.as_str().trim();
            let hanzi = match (caps.get(2), script) {
                (Some(second), Script::Simplified) => second.as_str().trim(),
                _ => first,
            };
            let pinyin = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
            Some(MeasureWord::new(hanzi, pinyin))
        })
        .collect()
}

fn measure_word_list(gloss: &str) -> Option<&str> {
    MEASURE_WORD_MARKERS.iter().find_map(|marker| gloss.strip_prefix(marker))
}

/// 词条拼音逐个位置解析；非拼音内容降级为纯文本。儿化不加空格。
fn parse_entry_reading(pinyin: &str, table: &SyllableTable) -> Word {
    let mut word = Word::new();
    for slot in pinyin.split_whitespace() {
        let token = match pinyin::parse_syllable(slot, table) {
            Some(s) => Token::Syllable(s),
            None => match Token::text(slot) {
                Ok(t) => t,
                Err(_) => continue,
            },
        };
        if !word.is_empty() && !token.is_erhua() {
            word.push(Token::text(" ").ok());
        }
        word.push(token);
    }
    word
}

// ============================================================
// 词典
// ============================================================

pub struct Dictionary {
    /// 简体与繁体键指向同一个词条
    entries: HashMap<String, Arc<Entry>>,
    /// 最长键（字符数）
    longest: usize,
    syllables: SyllableTable,
}

impl Dictionary {
    /// 从若干词表文本构建，按优先级从低到高排列
    pub fn from_sources<S: AsRef<str>>(sources: &[S], need_meanings: bool) -> Self {
        let syllables = SyllableTable::new();
        let mut entries: HashMap<String, Arc<Entry>> = HashMap::new();

        for source in sources {
            // 同一词表内先出现的读音优先
            let mut local: HashMap<String, Arc<Entry>> = HashMap::new();
            let mut lines = 0usize;
            for line in source.as_ref().lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some(caps) = entry_line().captures(line) else {
                    debug!("[Dict] skip line: {}", line);
                    continue;
                };
                let traditional = caps[1].to_string();
                let simplified = caps[2].to_string();
                let meanings = need_meanings.then(|| {
                    caps[4]
                        .split('/')
                        .map(str::trim)
                        .filter(|m| !m.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                });
                let entry = Arc::new(Entry {
                    reading: parse_entry_reading(&caps[3], &syllables),
                    traditional: traditional.clone(),
                    simplified: simplified.clone(),
                    meanings,
                });
                local.entry(simplified).or_insert_with(|| entry.clone());
                local.entry(traditional).or_insert(entry);
                lines += 1;
            }
            debug!("[Dict] source: {} lines, {} keys", lines, local.len());
            entries.extend(local);
        }

        let longest = entries.keys().map(|k| k.chars().count()).max().unwrap_or(0);
        info!("[Dict] {} keys, longest {} chars", entries.len(), longest);
        Dictionary { entries, longest, syllables }
    }

    /// 语言词典文件名
    pub fn language_file(language: &str) -> Option<&'static str> {
        match language {
            "en" => Some("cedict_ts.u8"),
            "de" => Some("handedict_nb.u8"),
            "fr" => Some("cfdict.u8"),
            "nl" => Some("cedict_nl.u8"),
            _ => None,
        }
    }

    /// 从目录加载：语言词典 → 补充词典 → 用户词典。缺失的文件跳过。
    pub fn load(directory: &Path, language: &str, need_meanings: bool) -> anyhow::Result<Self> {
        let start = std::time::Instant::now();
        let mut names: Vec<&str> = Vec::new();
        match Self::language_file(language) {
            Some(name) => names.push(name),
            None => warn!("[Dict] no word list for language {:?}", language),
        }
        names.push(SUPPLEMENTARY_FILE);
        names.push(USER_FILE);

        let mut sources = Vec::new();
        for name in names {
            let path = directory.join(name);
            if !path.exists() {
                warn!("[Dict] {:?} not found, skipped", path);
                continue;
            }
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading dictionary {:?}", path))?;
            info!("[Dict] {:?}", path);
            sources.push(text);
        }

        let dict = Self::from_sources(&sources, need_meanings);
        info!("[Dict] loaded in {:?}", start.elapsed());
        Ok(dict)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn syllables(&self) -> &SyllableTable {
        &self.syllables
    }

    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key).map(|e| e.as_ref())
    }

    /// 贪心最长匹配：每个位置取最长的词典键，否则输出单个未识别字符
    pub fn segment<'t>(&self, text: &'t str) -> Vec<Segment<'_, 't>> {
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let n = bounds.len() - 1;
        let mut out = Vec::new();
        let mut i = 0;

        while i < n {
            let max = self.longest.min(n - i);
            let found = (1..=max).rev().find_map(|len| {
                let key = &text[bounds[i]..bounds[i + len]];
                self.entries.get(key).map(|entry| (len, key, entry.as_ref()))
            });
            match found {
                Some((len, key, entry)) => {
                    out.push(Segment::Known { text: key, entry });
                    i += len;
                }
                None => {
                    if let Some(ch) = text[bounds[i]..].chars().next() {
                        out.push(Segment::Unknown(ch));
                    }
                    i += 1;
                }
            }
        }
        out
    }

    /// 分词并拼出读音。词之间插入空格（已有空白或标点时不插）。
    pub fn reading(&self, text: &str) -> Reading {
        let text = strip_html(text);
        let mut reading = Reading::new();
        let mut pending = String::new();

        for segment in self.segment(&text) {
            match segment {
                Segment::Unknown(ch) => pending.push(ch),
                Segment::Known { entry, .. } => {
                    if !pending.is_empty() {
                        reading.push(Word::from_iter([Token::text(std::mem::take(&mut pending)).ok()]));
                    }
                    let word = entry.reading.clone();
                    if !reading.is_empty() && !reading.ends_with_whitespace() && !is_punctuation(&word) {
                        reading.push(Word::from_iter([Token::text(" ").ok()]));
                    }
                    reading.push(word);
                }
            }
        }
        if !pending.is_empty() {
            reading.push(Word::from_iter([Token::text(pending).ok()]));
        }
        reading
    }

    /// 开头最长词条的释义；开头不是词典词时返回 None
    pub fn meanings(&self, text: &str, split_measure_words: bool, script: Script) -> Option<Meanings> {
        let text = strip_html(text);
        let entry = match self.segment(text.trim()).first() {
            Some(Segment::Known { entry, .. }) => *entry,
            _ => return None,
        };
        let raw = entry.meanings.as_ref()?;

        let mut meanings = Meanings::default();
        for gloss in raw {
            match measure_word_list(gloss) {
                Some(list) if split_measure_words => {
                    meanings.measure_words.extend(parse_measure_words(list, script));
                }
                _ => meanings.glosses.push(resolve_pairs(gloss, script)),
            }
        }
        Some(meanings)
    }

    /// 简繁转换：识别出的词换成对应字形，其余原样保留
    pub fn convert(&self, text: &str, script: Script) -> String {
        self.segment(text)
            .into_iter()
            .map(|segment| match segment {
                Segment::Known { entry, .. } => entry.script(script).to_string(),
                Segment::Unknown(ch) => ch.to_string(),
            })
            .collect()
    }
}

// ============================================================
// 测试
// ============================================================
