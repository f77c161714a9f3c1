//! # 字段渲染与重新规整
//!
//! 把读音、释义、量词、链接渲染成宿主可存储的 HTML 片段；
//! 以及把之前生成过的字段内容解析回来再重新渲染（reformat）。

use std::sync::OnceLock;

use regex::Regex;
use url::form_urlencoded;

use crate::config::{Config, MeaningConfig, Numbering, ReadingConfig, Separator, WebLink};
use crate::dictionary::{strip_html, Dictionary, MeasureWord};
use crate::model::{Reading, Word};
use crate::pinyin::{parse_reading, tokenize, SyllableTable};
use crate::transform::{colorize, colorize_word, mask_hanzi, tone_sandhi};

fn sound_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[sound:[^\]]*\]").expect("sound tag pattern"))
}

fn line_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</?div>|</?p>").expect("line break pattern"))
}

/// 释义编号：① … ⑳ 或行首/空白后的 `1.`
fn numbering_mark() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[\x{2460}-\x{2473}]|(?:^|\s)\(?\d+[.)]\s").expect("numbering pattern")
    })
}

// ============================================================
// 渲染
// ============================================================

/// 按配置上色并输出 HTML
pub fn render_reading(reading: &Reading, cfg: &ReadingConfig) -> String {
    if cfg.colorize {
        colorize(reading, &cfg.tone_colors, cfg.color_basis).to_html(cfg.tonify)
    } else {
        reading.to_html(cfg.tonify)
    }
}

fn render_word(word: &Word, cfg: &ReadingConfig) -> String {
    if cfg.colorize {
        colorize_word(word, &cfg.tone_colors, cfg.color_basis).to_html(cfg.tonify)
    } else {
        word.to_html(cfg.tonify)
    }
}

fn number(index: usize, numbering: Numbering) -> String {
    match numbering {
        Numbering::Circled => match char::from_u32(0x2460 + index as u32) {
            Some(mark) if index < 20 => mark.to_string(),
            _ => format!("({})", index + 1),
        },
        Numbering::Arabic => format!("{}. ", index + 1),
        Numbering::None => String::new(),
    }
}

/// 释义列表 → HTML。释义内的拼音按读音规则渲染，词条本身被遮盖。
/// 只有一条释义时不编号。
pub fn format_meanings(
    glosses: &[String],
    masks: &[String],
    table: &SyllableTable,
    cfg: &Config,
) -> Option<String> {
    let meaning = &cfg.meaning;
    let rendered: Vec<String> = glosses
        .iter()
        .map(|gloss| gloss.trim())
        .filter(|gloss| !gloss.is_empty())
        .map(|gloss| {
            let mut word = tokenize(gloss, table);
            if meaning.mask_hanzi {
                for span in masks {
                    word = mask_hanzi(&word, span, &meaning.mask_placeholder);
                }
            }
            render_word(&word, &cfg.reading)
        })
        .collect();

    if rendered.is_empty() {
        return None;
    }
    if rendered.len() == 1 {
        return rendered.into_iter().next();
    }
    let numbered: Vec<String> = rendered
        .into_iter()
        .enumerate()
        .map(|(i, gloss)| format!("{}{}", number(i, meaning.numbering), gloss))
        .collect();
    Some(numbered.join(meaning.separator_text()))
}

/// `本 - běn, 册 - cè`
pub fn format_measure_words(
    measure_words: &[MeasureWord],
    table: &SyllableTable,
    cfg: &ReadingConfig,
) -> Option<String> {
    if measure_words.is_empty() {
        return None;
    }
    let items: Vec<String> = measure_words
        .iter()
        .map(|mw| {
            let reading = parse_reading(&mw.pinyin, table);
            if reading.has_tones() {
                format!("{} - {}", mw.hanzi, render_reading(&reading, cfg))
            } else {
                mw.hanzi.clone()
            }
        })
        .collect();
    Some(items.join(", "))
}

/// 量词的拼音拼成一段读音，供音频匹配
pub fn measure_word_reading(measure_words: &[MeasureWord], table: &SyllableTable) -> Reading {
    let pinyin: Vec<&str> = measure_words
        .iter()
        .map(|mw| mw.pinyin.as_str())
        .filter(|p| !p.trim().is_empty())
        .collect();
    parse_reading(&pinyin.join(" "), table)
}

/// 查询参数编码（application/x-www-form-urlencoded）
pub fn percent_encode(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

/// `<a href="…" title="MDBG">MDBG</a> <a …>…</a>`
pub fn format_weblinks(expression: &str, links: &[WebLink]) -> Option<String> {
    let expression = expression.trim();
    if expression.is_empty() || links.is_empty() {
        return None;
    }
    let encoded = percent_encode(expression);
    let anchors: Vec<String> = links
        .iter()
        .map(|link| {
            format!(
                "<a href=\"{}\" title=\"{}\">{}</a>",
                link.url.replace("{searchTerms}", &encoded),
                link.name,
                link.name
            )
        })
        .collect();
    Some(anchors.join(" "))
}

// ============================================================
// 重新规整
// ============================================================

/// 读音：`[sound:..]` 原样保留，其余去掉标签后重新解析、变调、渲染
pub fn reformat_reading(content: &str, table: &SyllableTable, cfg: &ReadingConfig) -> String {
    let mut out = String::new();
    let mut last = 0;
    for tag in sound_tag().find_iter(content) {
        out.push_str(&reformat_pinyin(&content[last..tag.start()], table, cfg));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&reformat_pinyin(&content[last..], table, cfg));
    out
}

fn reformat_pinyin(span: &str, table: &SyllableTable, cfg: &ReadingConfig) -> String {
    let text = strip_html(span);
    if text.is_empty() {
        return text;
    }
    let reading = parse_reading(&text, table);
    let reading = if cfg.sandhi { tone_sandhi(&reading) } else { reading };
    render_reading(&reading, cfg)
}

/// 拆出已渲染释义中的各条：按换行 / 自定义分隔符 / 编号切分
pub fn split_glosses(content: &str, cfg: &MeaningConfig) -> Vec<String> {
    let text = strip_html(&line_break().replace_all(content, "\n"));
    let pieces: Vec<&str> = match cfg.separator {
        Separator::Custom if !cfg.custom_separator.trim().is_empty() => text
            .lines()
            .flat_map(|line| line.split(cfg.custom_separator.trim()))
            .collect(),
        _ => text.lines().collect(),
    };
    pieces
        .into_iter()
        .flat_map(|piece| numbering_mark().split(piece))
        .map(|gloss| gloss.trim().trim_end_matches(',').trim())
        .filter(|gloss| !gloss.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn reformat_meaning(content: &str, masks: &[String], table: &SyllableTable, cfg: &Config) -> String {
    let glosses = split_glosses(content, &cfg.meaning);
    format_meanings(&glosses, masks, table, cfg).unwrap_or_default()
}

/// 表达式按配置字形重写
pub fn reformat_expression(content: &str, dict: &Dictionary, cfg: &Config) -> String {
    dict.convert(strip_html(content).trim(), cfg.dictionary.script)
}
