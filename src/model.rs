//! # 注音数据模型
//!
//! - `Token`：纯文本 / 带调音节 / 带调汉字 三种不可变标记
//! - `Word`：有序 Token 序列（分词单位）
//! - `Reading`：有序 Word 序列（一次注音请求的完整读音）
//!
//! 所有变换都产出新值，不原地修改。

use crate::error::{Error, Result};
use crate::pinyin;

// ============================================================
// 声调
// ============================================================

/// 五个规范声调（第五声 = 轻声）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tone {
    High = 1,
    Rising = 2,
    Dipping = 3,
    Falling = 4,
    Neutral = 5,
}

impl Tone {
    pub const ALL: [Tone; 5] = [Tone::High, Tone::Rising, Tone::Dipping, Tone::Falling, Tone::Neutral];

    pub fn from_digit(digit: u32) -> Option<Tone> {
        match digit {
            1 => Some(Tone::High),
            2 => Some(Tone::Rising),
            3 => Some(Tone::Dipping),
            4 => Some(Tone::Falling),
            5 => Some(Tone::Neutral),
            _ => None,
        }
    }

    pub fn from_char(ch: char) -> Option<Tone> {
        ch.to_digit(10).and_then(Tone::from_digit)
    }

    pub fn digit(self) -> u8 {
        self as u8
    }

    /// 调色板下标 (0..5)
    pub fn index(self) -> usize {
        self as usize - 1
    }
}

/// (书写调, 实际调) 对。变调只改实际调，原始数据不丢失。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ToneInfo {
    written: Tone,
    spoken: Tone,
}

impl ToneInfo {
    /// 任一缺省时取另一个；两者都缺省属于编程错误
    pub fn new(written: Option<Tone>, spoken: Option<Tone>) -> Result<Self> {
        match (written, spoken) {
            (Some(w), Some(s)) => Ok(Self { written: w, spoken: s }),
            (Some(t), None) | (None, Some(t)) => Ok(Self::plain(t)),
            (None, None) => Err(Error::MissingTone),
        }
    }

    pub fn plain(tone: Tone) -> Self {
        Self { written: tone, spoken: tone }
    }

    pub fn written(&self) -> Tone {
        self.written
    }

    pub fn spoken(&self) -> Tone {
        self.spoken
    }

    pub fn with_spoken(self, spoken: Tone) -> Self {
        Self { spoken, ..self }
    }

    /// 实际调与书写调不同（发生了变调）
    pub fn is_sandhi(&self) -> bool {
        self.written != self.spoken
    }
}

// ============================================================
// 显示属性
// ============================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Attrs {
    /// 前景色，如 "#ff0000"
    pub color: Option<String>,
}

impl Attrs {
    pub fn colored(color: impl Into<String>) -> Self {
        Self { color: Some(color.into()) }
    }
}

// ============================================================
// Token
// ============================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Text {
    text: String,
    attrs: Attrs,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        Self::with_attrs(text, Attrs::default())
    }

    pub fn with_attrs(text: impl Into<String>, attrs: Attrs) -> Result<Self> {
        let text = text.into();
        if text.is_empty() {
            return Err(Error::EmptyText("text"));
        }
        Ok(Self { text, attrs })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Syllable {
    stem: String,
    tone: ToneInfo,
    attrs: Attrs,
}

impl Syllable {
    pub fn new(stem: impl Into<String>, tone: ToneInfo) -> Self {
        Self { stem: stem.into(), tone, attrs: Attrs::default() }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn tone(&self) -> ToneInfo {
        self.tone
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// 儿化后缀：词干为 "r"（不分大小写）且书写调为轻声
    pub fn is_erhua(&self) -> bool {
        self.stem.eq_ignore_ascii_case("r") && self.tone.written == Tone::Neutral
    }

    /// 数字调形式，如 "hao3"；儿化后缀不显示声调
    pub fn numeric(&self) -> String {
        if self.is_erhua() {
            self.stem.clone()
        } else {
            format!("{}{}", self.stem, self.tone.written.digit())
        }
    }

    /// 声调符号形式，如 "hǎo"
    pub fn tonified(&self) -> String {
        if self.is_erhua() {
            self.stem.clone()
        } else {
            pinyin::add_tone_mark(&self.stem, self.tone.written)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToneChar {
    ch: String,
    tone: ToneInfo,
    attrs: Attrs,
}

impl ToneChar {
    pub fn new(ch: impl Into<String>, tone: ToneInfo) -> Result<Self> {
        let ch = ch.into();
        if ch.is_empty() {
            return Err(Error::EmptyText("tone char"));
        }
        Ok(Self { ch, tone, attrs: Attrs::default() })
    }

    pub fn ch(&self) -> &str {
        &self.ch
    }

    pub fn tone(&self) -> ToneInfo {
        self.tone
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

/// 三种标记的封闭联合，消费处一律穷举匹配
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Text(Text),
    Syllable(Syllable),
    ToneChar(ToneChar),
}

impl Token {
    pub fn text(text: impl Into<String>) -> Result<Token> {
        Text::new(text).map(Token::Text)
    }

    pub fn syllable(stem: impl Into<String>, tone: Tone) -> Token {
        Token::Syllable(Syllable::new(stem, ToneInfo::plain(tone)))
    }

    pub fn attrs(&self) -> &Attrs {
        match self {
            Token::Text(t) => &t.attrs,
            Token::Syllable(s) => &s.attrs,
            Token::ToneChar(c) => &c.attrs,
        }
    }

    pub fn with_attrs(self, attrs: Attrs) -> Token {
        match self {
            Token::Text(t) => Token::Text(Text { attrs, ..t }),
            Token::Syllable(s) => Token::Syllable(Syllable { attrs, ..s }),
            Token::ToneChar(c) => Token::ToneChar(ToneChar { attrs, ..c }),
        }
    }

    /// 纯文本没有声调
    pub fn tone(&self) -> Option<ToneInfo> {
        match self {
            Token::Text(_) => None,
            Token::Syllable(s) => Some(s.tone),
            Token::ToneChar(c) => Some(c.tone),
        }
    }

    /// 替换实际调；纯文本原样返回
    pub fn with_spoken(self, spoken: Tone) -> Token {
        match self {
            Token::Text(t) => Token::Text(t),
            Token::Syllable(s) => Token::Syllable(Syllable { tone: s.tone.with_spoken(spoken), ..s }),
            Token::ToneChar(c) => Token::ToneChar(ToneChar { tone: c.tone.with_spoken(spoken), ..c }),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Token::Text(t) if t.is_blank())
    }

    pub fn is_erhua(&self) -> bool {
        matches!(self, Token::Syllable(s) if s.is_erhua())
    }

    /// 显示文本（不含颜色）
    pub fn render(&self, tonify: bool) -> String {
        match self {
            Token::Text(t) => t.text.clone(),
            Token::Syllable(s) if tonify => s.tonified(),
            Token::Syllable(s) => s.numeric(),
            Token::ToneChar(c) => c.ch.clone(),
        }
    }

    /// HTML 形式：带颜色时包一层 span
    pub fn render_html(&self, tonify: bool) -> String {
        let body = self.render(tonify);
        match &self.attrs().color {
            Some(color) => format!("<span style=\"color:{}\">{}</span>", color, body),
            None => body,
        }
    }
}

// ============================================================
// Word
// ============================================================

/// 有序 Token 序列；push 的 None 会被静默丢弃
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Word(Vec<Token>);

impl Word {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, token: impl Into<Option<Token>>) {
        if let Some(token) = token.into() {
            self.0.push(token);
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 等长映射
    pub fn map(&self, mut f: impl FnMut(&Token) -> Token) -> Word {
        Word(self.0.iter().map(|t| f(t)).collect())
    }

    /// 展平映射：每个 Token 产出零个或多个 Token
    pub fn concat_map<I>(&self, mut f: impl FnMut(&Token) -> I) -> Word
    where
        I: IntoIterator<Item = Token>,
    {
        Word(self.0.iter().flat_map(|t| f(t)).collect())
    }

    pub fn flatten(&self, tonify: bool) -> String {
        self.0.iter().map(|t| t.render(tonify)).collect()
    }

    pub fn to_html(&self, tonify: bool) -> String {
        self.0.iter().map(|t| t.render_html(tonify)).collect()
    }

    /// 只含空白文本（或为空）
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(Token::is_blank)
    }

    pub fn has_tones(&self) -> bool {
        self.0.iter().any(|t| t.tone().is_some())
    }
}

impl From<Token> for Word {
    fn from(token: Token) -> Self {
        Word(vec![token])
    }
}

impl FromIterator<Token> for Word {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Word(iter.into_iter().collect())
    }
}

impl FromIterator<Option<Token>> for Word {
    fn from_iter<I: IntoIterator<Item = Option<Token>>>(iter: I) -> Self {
        Word(iter.into_iter().flatten().collect())
    }
}

impl IntoIterator for Word {
    type Item = Token;
    type IntoIter = std::vec::IntoIter<Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Word {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================
// Reading
// ============================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reading(Vec<Word>);

impl Reading {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, word: Word) {
        self.0.push(word);
    }

    pub fn words(&self) -> &[Word] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 按顺序遍历所有 Token
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.0.iter().flat_map(|w| w.iter())
    }

    pub fn map_words(&self, f: impl FnMut(&Word) -> Word) -> Reading {
        Reading(self.0.iter().map(f).collect())
    }

    /// 对每个 Word 做等长映射
    pub fn map(&self, mut f: impl FnMut(&Token) -> Token) -> Reading {
        self.map_words(|w| w.map(&mut f))
    }

    pub fn concat_map<I>(&self, mut f: impl FnMut(&Token) -> I) -> Reading
    where
        I: IntoIterator<Item = Token>,
    {
        self.map_words(|w| w.concat_map(&mut f))
    }

    pub fn has_tones(&self) -> bool {
        self.0.iter().any(Word::has_tones)
    }

    /// 最后一个 Token 是否以空白结尾
    pub fn ends_with_whitespace(&self) -> bool {
        match self.tokens().last() {
            Some(Token::Text(t)) => t.text().ends_with(char::is_whitespace),
            _ => false,
        }
    }

    /// 展平为显示字符串；`tonify` 时用声调符号代替数字
    pub fn flatten(&self, tonify: bool) -> String {
        self.0.iter().map(|w| w.flatten(tonify)).collect()
    }

    pub fn to_html(&self, tonify: bool) -> String {
        self.0.iter().map(|w| w.to_html(tonify)).collect()
    }
}

impl From<Vec<Word>> for Reading {
    fn from(words: Vec<Word>) -> Self {
        Reading(words)
    }
}

impl FromIterator<Word> for Reading {
    fn from_iter<I: IntoIterator<Item = Word>>(iter: I) -> Self {
        Reading(iter.into_iter().collect())
    }
}

impl IntoIterator for Reading {
    type Item = Word;
    type IntoIter = std::vec::IntoIter<Word>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================================
// 测试
// ============================================================
