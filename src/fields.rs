//! # 字段推导
//!
//! 宿主的一条笔记有固定的一组字段（expression / reading / meaning / mw /
//! audio / mwaudio / color / simp / trad / weblinks）。给定已有内容，
//! 用推导图补全空白字段：
//!
//! - 不带生成标记的非空内容归用户所有，永不覆盖
//! - 带标记的内容：开启 reformat 时解析后重新渲染，表达式变化时重新生成
//! - 空白字段按规则推导，推导不出保持空白

use std::collections::{BTreeMap, HashMap};

use log::{debug, error, info};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::dictionary::{strip_html, Dictionary, Meanings, MeasureWord, Script};
use crate::format;
use crate::graph::Graph;
use crate::media::{resolve_audio, sound_tags, MediaPack};
use crate::model::Reading;
use crate::pinyin::parse_reading;
use crate::transform::{colorize_word, tone_chars, tone_sandhi};
use crate::translate::Translator;

// ============================================================
// 生成标记
// ============================================================

/// 自动生成内容的前缀，渲染时不可见
pub const GENERATED_MARKER: &str = "<!--generated-->";

pub fn is_generated(content: &str) -> bool {
    content.starts_with(GENERATED_MARKER)
}

pub fn mark_generated(content: &str) -> String {
    format!("{}{}", GENERATED_MARKER, strip_marker(content))
}

pub fn strip_marker(content: &str) -> &str {
    content.strip_prefix(GENERATED_MARKER).unwrap_or(content)
}

// ============================================================
// 字段
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "expression")]
    Expression,
    #[serde(rename = "reading")]
    Reading,
    #[serde(rename = "meaning")]
    Meaning,
    #[serde(rename = "mw")]
    MeasureWord,
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "mwaudio")]
    MeasureWordAudio,
    #[serde(rename = "color")]
    Color,
    #[serde(rename = "simp")]
    Simplified,
    #[serde(rename = "trad")]
    Traditional,
    #[serde(rename = "weblinks")]
    WebLinks,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Expression,
        Field::Reading,
        Field::Meaning,
        Field::MeasureWord,
        Field::Audio,
        Field::MeasureWordAudio,
        Field::Color,
        Field::Simplified,
        Field::Traditional,
        Field::WebLinks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Expression => "expression",
            Field::Reading => "reading",
            Field::Meaning => "meaning",
            Field::MeasureWord => "mw",
            Field::Audio => "audio",
            Field::MeasureWordAudio => "mwaudio",
            Field::Color => "color",
            Field::Simplified => "simp",
            Field::Traditional => "trad",
            Field::WebLinks => "weblinks",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// 给宿主的一次性提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// 没有安装任何音频包
    NoMediaPacks,
    /// 最佳音频包仍缺少部分音节
    MissingAudio { field: Field, missing: usize },
    /// 释义来自在线翻译
    Translated { expression: String },
}

/// 推导结果：需要写回的字段（已带生成标记；空串表示清空）与提示
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Update {
    pub fields: BTreeMap<Field, String>,
    pub notices: Vec<Notice>,
}

impl Update {
    /// 写回内容，去掉生成标记
    pub fn text(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(|c| strip_marker(c))
    }
}

// ============================================================
// 推导图节点
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node {
    /// 笔记中已有的非空内容
    Given(Field),
    /// 要写回的字段
    Output(Field),
    Expression,
    DictionaryReading,
    Syllables,
    /// 变调后的读音
    Spoken,
    Definition,
    Glosses,
    MeasureWords,
}

#[derive(Debug, Clone)]
enum Datum {
    Text(String),
    Reading(Reading),
    Definition(Meanings),
    Glosses(Vec<String>),
    MeasureWords(Vec<MeasureWord>),
}

impl Datum {
    fn text(&self) -> Option<&str> {
        match self {
            Datum::Text(t) => Some(t),
            _ => None,
        }
    }

    fn reading(&self) -> Option<&Reading> {
        match self {
            Datum::Reading(r) => Some(r),
            _ => None,
        }
    }
}

/// 一次请求的上下文
struct Request<'a> {
    dict: &'a Dictionary,
    config: &'a Config,
    media: &'a [MediaPack],
    translator: &'a dyn Translator,
    rng: &'a mut dyn RngCore,
    notices: Vec<Notice>,
}

impl Request<'_> {
    fn notify(&mut self, notice: Notice) {
        if !self.notices.contains(&notice) {
            info!("[Fields] notice: {:?}", notice);
            self.notices.push(notice);
        }
    }

    fn audio(&mut self, field: Field, reading: &Reading) -> Option<String> {
        if self.media.is_empty() {
            self.notify(Notice::NoMediaPacks);
            return None;
        }
        let (files, missing) = {
            let resolution = resolve_audio(reading, self.media, &self.config.audio.extensions, &mut *self.rng);
            if let Some(pack) = resolution.pack {
                debug!("[Fields] {} from pack {}", field.name(), pack.name());
            }
            (resolution.files, resolution.missing)
        };
        if missing > 0 {
            self.notify(Notice::MissingAudio { field, missing });
        }
        if files.is_empty() {
            return None;
        }
        Some(sound_tags(&files))
    }
}

/// 释义中需遮盖的写法：表达式本身及其简繁形式，去重去空
fn masks(dict: &Dictionary, expression: &str) -> Vec<String> {
    let mut masks: Vec<String> = Vec::new();
    let forms = [
        expression.to_string(),
        dict.convert(expression, Script::Simplified),
        dict.convert(expression, Script::Traditional),
    ];
    for form in forms {
        if !form.is_empty() && !masks.contains(&form) {
            masks.push(form);
        }
    }
    masks
}

fn stored_content(fields: &BTreeMap<Field, String>, field: Field) -> &str {
    fields.get(&field).map(String::as_str).unwrap_or("")
}

fn non_blank(text: String) -> Option<Datum> {
    if text.trim().is_empty() {
        None
    } else {
        Some(Datum::Text(text))
    }
}

fn plain_text(datum: &Datum) -> Option<String> {
    let text = strip_html(datum.text()?).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn rules<'a>() -> Graph<Node, Datum, Request<'a>> {
    use Node::*;

    let mut g: Graph<Node, Datum, Request<'a>> = Graph::new();

    // 表达式：已有 → 简体 → 繁体
    g.rule(Expression, &[Given(Field::Expression)], |_, v| plain_text(&v[0]).map(Datum::Text))
        .rule(Expression, &[Given(Field::Simplified)], |_, v| plain_text(&v[0]).map(Datum::Text))
        .rule(Expression, &[Given(Field::Traditional)], |_, v| plain_text(&v[0]).map(Datum::Text));

    // 读音：已有读音优先，否则查词典
    g.rule(DictionaryReading, &[Expression], |req, v| {
        let reading = req.dict.reading(v[0].text()?);
        reading.has_tones().then_some(Datum::Reading(reading))
    })
    .rule(Syllables, &[Given(Field::Reading)], |req, v| {
        let reading = parse_reading(&plain_text(&v[0])?, req.dict.syllables());
        reading.has_tones().then_some(Datum::Reading(reading))
    })
    .rule(Syllables, &[DictionaryReading], |_, v| Some(v[0].clone()))
    .rule(Spoken, &[Syllables], |req, v| {
        let reading = v[0].reading()?;
        let spoken = if req.config.reading.sandhi { tone_sandhi(reading) } else { reading.clone() };
        Some(Datum::Reading(spoken))
    })
    .rule(Output(Field::Reading), &[Spoken], |req, v| {
        non_blank(format::render_reading(v[0].reading()?, &req.config.reading))
    });

    // 释义：词典 → 在线翻译
    g.rule(Definition, &[Expression], |req, v| {
        let meaning = &req.config.meaning;
        req.dict
            .meanings(v[0].text()?, meaning.split_measure_words, req.config.dictionary.script)
            .map(Datum::Definition)
    })
    .rule(Glosses, &[Definition], |_, v| match &v[0] {
        Datum::Definition(m) if !m.glosses.is_empty() => Some(Datum::Glosses(m.glosses.clone())),
        _ => None,
    })
    .rule(Glosses, &[Expression], |req, v| {
        let meaning = &req.config.meaning;
        if !meaning.fallback_translation {
            return None;
        }
        let expression = v[0].text()?.to_string();
        let glosses = req.translator.translate(&expression, &meaning.translation_language)?;
        req.notify(Notice::Translated { expression });
        Some(Datum::Glosses(glosses))
    })
    .rule(Output(Field::Meaning), &[Glosses, Expression], |req, v| {
        let Datum::Glosses(glosses) = &v[0] else {
            return None;
        };
        let masks = masks(req.dict, v[1].text()?);
        format::format_meanings(glosses, &masks, req.dict.syllables(), req.config).map(Datum::Text)
    });

    // 量词
    g.rule(MeasureWords, &[Definition], |_, v| match &v[0] {
        Datum::Definition(m) if !m.measure_words.is_empty() => {
            Some(Datum::MeasureWords(m.measure_words.clone()))
        }
        _ => None,
    })
    .rule(Output(Field::MeasureWord), &[MeasureWords], |req, v| {
        let Datum::MeasureWords(mws) = &v[0] else {
            return None;
        };
        format::format_measure_words(mws, req.dict.syllables(), &req.config.reading).map(Datum::Text)
    });

    // 音频
    g.rule(Output(Field::Audio), &[Spoken], |req, v| {
        req.audio(Field::Audio, v[0].reading()?).map(Datum::Text)
    })
    .rule(Output(Field::MeasureWordAudio), &[MeasureWords], |req, v| {
        let Datum::MeasureWords(mws) = &v[0] else {
            return None;
        };
        let reading = format::measure_word_reading(mws, req.dict.syllables());
        let reading = if req.config.reading.sandhi { tone_sandhi(&reading) } else { reading };
        req.audio(Field::MeasureWordAudio, &reading).map(Datum::Text)
    });

    // 汉字上色
    g.rule(Output(Field::Color), &[Expression, Spoken], |req, v| {
        let word = tone_chars(v[0].text()?, v[1].reading()?)?;
        let reading = &req.config.reading;
        non_blank(colorize_word(&word, &reading.tone_colors, reading.color_basis).to_html(false))
    });

    // 简繁：与表达式相同时留空
    g.rule(Output(Field::Simplified), &[Expression], |req, v| {
        let expression = v[0].text()?;
        let converted = req.dict.convert(expression, Script::Simplified);
        (converted != expression).then_some(Datum::Text(converted))
    })
    .rule(Output(Field::Traditional), &[Expression], |req, v| {
        let expression = v[0].text()?;
        let converted = req.dict.convert(expression, Script::Traditional);
        (converted != expression).then_some(Datum::Text(converted))
    });

    g.rule(Output(Field::WebLinks), &[Expression], |req, v| {
        format::format_weblinks(v[0].text()?, &req.config.weblinks).map(Datum::Text)
    });

    // 表达式本身只能从简繁字段得到
    g.rule(Output(Field::Expression), &[Expression], |_, v| Some(v[0].clone()));

    g
}

// ============================================================
// 入口
// ============================================================

pub struct Annotator {
    dict: Dictionary,
    config: Config,
    media: Vec<MediaPack>,
    translator: Box<dyn Translator>,
}

impl Annotator {
    pub fn new(dict: Dictionary, config: Config, media: Vec<MediaPack>, translator: Box<dyn Translator>) -> Self {
        info!("[Fields] {} dictionary keys, {} media packs", dict.len(), media.len());
        Self { dict, config, media, translator }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn media(&self) -> &[MediaPack] {
        &self.media
    }

    /// 只给出表达式，生成其余全部字段
    pub fn annotate(&self, expression: &str) -> Update {
        let fields = BTreeMap::from([(Field::Expression, expression.to_string())]);
        self.update(&fields, Some(Field::Expression))
    }

    /// `changed` 为宿主报告的刚被修改的字段
    pub fn update(&self, fields: &BTreeMap<Field, String>, changed: Option<Field>) -> Update {
        let mut rng = rand::thread_rng();
        self.update_with_rng(fields, changed, &mut rng)
    }

    pub fn update_with_rng(
        &self,
        fields: &BTreeMap<Field, String>,
        changed: Option<Field>,
        rng: &mut dyn RngCore,
    ) -> Update {
        let regenerate = changed == Some(Field::Expression);

        let mut known = HashMap::new();
        for field in Field::ALL {
            let stored = stored_content(fields, field);
            let body = strip_marker(stored);
            if body.trim().is_empty() || (regenerate && is_generated(stored)) {
                continue;
            }
            known.insert(Node::Given(field), Datum::Text(body.to_string()));
        }

        let graph = rules();
        let mut eval = graph.evaluate(known);
        let mut req = Request {
            dict: &self.dict,
            config: &self.config,
            media: &self.media,
            translator: self.translator.as_ref(),
            rng,
            notices: Vec::new(),
        };

        let mut update = Update::default();
        for field in Field::ALL {
            let stored = stored_content(fields, field);
            let body = strip_marker(stored);
            let generated = is_generated(stored);

            if !generated && !body.trim().is_empty() {
                continue;
            }

            if generated && !body.trim().is_empty() && !regenerate {
                if self.config.reformat.enabled(field) {
                    let expression = match eval.resolve(&mut req, Node::Expression) {
                        Ok(Some(Datum::Text(e))) => e,
                        _ => String::new(),
                    };
                    let reformatted = mark_generated(&self.reformat(field, body, &expression));
                    if reformatted != stored {
                        debug!("[Fields] reformat {}", field.name());
                        update.fields.insert(field, reformatted);
                    }
                }
                continue;
            }

            let value = match eval.resolve(&mut req, Node::Output(field)) {
                Ok(Some(Datum::Text(text))) => Some(text),
                Ok(_) => None,
                Err(e) => {
                    error!("[Fields] {}: {}", field.name(), e);
                    None
                }
            };
            match value {
                Some(text) => {
                    update.fields.insert(field, mark_generated(&text));
                }
                // 重新生成失败的旧内容清空
                None if generated => {
                    update.fields.insert(field, String::new());
                }
                None => debug!("[Fields] {} unresolved", field.name()),
            }
        }

        update.notices = req.notices;
        update
    }

    fn reformat(&self, field: Field, body: &str, expression: &str) -> String {
        let table = self.dict.syllables();
        match field {
            Field::Reading => format::reformat_reading(body, table, &self.config.reading),
            Field::Meaning => {
                format::reformat_meaning(body, &masks(&self.dict, expression), table, &self.config)
            }
            Field::Expression => format::reformat_expression(body, &self.dict, &self.config),
            _ => body.to_string(),
        }
    }
}

// ============================================================
// 测试
// ============================================================
