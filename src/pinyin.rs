//! # 拼音解析
//!
//! 把自由文本中的带调拼音识别为 `Syllable`，其余保留为纯文本。
//!
//! ## 支持的写法
//! - 数字调：`hao3`、`lu:4`、`lv4`、`lü4`
//! - 声调符号：`hǎo`、`lǜ`（每个音节恰好一个符号，多于一个视为解析失败）
//! - 儿化：紧跟音节之后的无调 `r`
//!
//! ü 的三种写法（`u:` / `v` / `ü`）在解析前后统一为 `ü`。

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

use crate::model::{Reading, Syllable, Tone, ToneInfo, Token, Word};

// ============================================================
// 拼音合法音节表（ü 以 v 记）
// ============================================================

const VALID_SYLLABLES: &[&str] = &[
    "a", "o", "e", "ai", "ei", "ao", "ou", "an", "en", "ang", "eng", "er", "ê",
    "ba", "bo", "bi", "bu", "bai", "bei", "bao", "ban", "ben", "bang", "beng",
    "bie", "biao", "bian", "bin", "bing",
    "pa", "po", "pi", "pu", "pai", "pei", "pao", "pou", "pan", "pen", "pang", "peng",
    "pie", "piao", "pian", "pin", "ping",
    "ma", "mo", "me", "mi", "mu", "mai", "mei", "mao", "mou", "man", "men",
    "mang", "meng", "mie", "miao", "miu", "mian", "min", "ming",
    "fa", "fo", "fu", "fei", "fou", "fan", "fen", "fang", "feng", "fiao",
    "da", "de", "di", "du", "dai", "dei", "dao", "dou", "dan", "den", "dang", "deng",
    "dong", "dia", "die", "diao", "diu", "dian", "ding", "duo", "dui", "duan", "dun",
    "ta", "te", "ti", "tu", "tai", "tei", "tao", "tou", "tan", "tang", "teng",
    "tong", "tie", "tiao", "tian", "ting", "tuo", "tui", "tuan", "tun",
    "na", "ne", "ni", "nu", "nv", "nai", "nei", "nao", "nou", "nan", "nen",
    "nang", "neng", "nong", "nie", "niao", "niu", "nian", "niang", "nin", "ning",
    "nuo", "nuan", "nun", "nve",
    "la", "le", "li", "lo", "lu", "lv", "lai", "lei", "lao", "lou", "lan", "lang", "leng",
    "long", "lia", "lie", "liao", "liu", "lian", "liang", "lin", "ling", "luo", "luan",
    "lun", "lve",
    "ga", "ge", "gu", "gai", "gei", "gao", "gou", "gan", "gen", "gang", "geng",
    "gong", "gua", "guai", "guan", "guang", "gui", "gun", "guo",
    "ka", "ke", "ku", "kai", "kei", "kao", "kou", "kan", "ken", "kang", "keng",
    "kong", "kua", "kuai", "kuan", "kuang", "kui", "kun", "kuo",
    "ha", "he", "hu", "hai", "hei", "hao", "hou", "han", "hen", "hang", "heng",
    "hong", "hua", "huai", "huan", "huang", "hui", "hun", "huo",
    "ji", "ju", "jia", "jie", "jiao", "jiu", "jian", "jin", "jiang", "jing",
    "jiong", "juan", "jun", "jue",
    "qi", "qu", "qia", "qie", "qiao", "qiu", "qian", "qin", "qiang", "qing",
    "qiong", "quan", "qun", "que",
    "xi", "xu", "xia", "xie", "xiao", "xiu", "xian", "xin", "xiang", "xing",
    "xiong", "xuan", "xun", "xue",
    "zha", "zhe", "zhi", "zhu", "zhai", "zhei", "zhao", "zhou", "zhan", "zhen",
    "zhang", "zheng", "zhong", "zhua", "zhuai", "zhuan", "zhuang", "zhui", "zhun", "zhuo",
    "cha", "che", "chi", "chu", "chai", "chao", "chou", "chan", "chen",
    "chang", "cheng", "chong", "chua", "chuai", "chuan", "chuang", "chui", "chun", "chuo",
    "sha", "she", "shi", "shu", "shai", "shei", "shao", "shou", "shan", "shen",
    "shang", "sheng", "shua", "shuai", "shuan", "shuang", "shui", "shun", "shuo",
    "r", "re", "ri", "ru", "rao", "rou", "ran", "ren", "rang", "reng",
    "rong", "rua", "ruan", "rui", "run", "ruo",
    "za", "ze", "zi", "zu", "zai", "zei", "zao", "zou", "zan", "zen", "zang", "zeng",
    "zong", "zuo", "zui", "zuan", "zun",
    "ca", "ce", "ci", "cu", "cai", "cao", "cou", "can", "cen", "cang", "ceng",
    "cong", "cuo", "cui", "cuan", "cun",
    "sa", "se", "si", "su", "sai", "sao", "sou", "san", "sen", "sang", "seng",
    "song", "suo", "sui", "suan", "sun",
    "ya", "ye", "yi", "yo", "yu", "yao", "you", "yan", "yin", "yang", "ying",
    "yong", "yuan", "yun", "yue",
    "wa", "wo", "wu", "wai", "wei", "wan", "wen", "wang", "weng",
    "m", "n", "ng", "hm", "hng",
];

/// 最长合法音节（字符数）+ 一位声调
const MAX_CANDIDATE_CHARS: usize = 7;

/// 合法音节集合。随词典构建一次，之后只读。
#[derive(Debug, Clone)]
pub struct SyllableTable {
    stems: HashSet<&'static str>,
}

impl SyllableTable {
    pub fn new() -> Self {
        Self { stems: VALID_SYLLABLES.iter().copied().collect() }
    }

    /// 不分大小写，ü 与 v 等价
    pub fn contains(&self, stem: &str) -> bool {
        let key: String = stem
            .chars()
            .map(|c| match c {
                'ü' | 'Ü' => 'v',
                'Ê' => 'ê',
                _ => c.to_ascii_lowercase(),
            })
            .collect();
        self.stems.contains(key.as_str())
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }
}

impl Default for SyllableTable {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// 声调符号
// ============================================================

const MACRON: char = '\u{0304}';
const ACUTE: char = '\u{0301}';
const CARON: char = '\u{030C}';
const GRAVE: char = '\u{0300}';

fn tone_from_mark(mark: char) -> Option<Tone> {
    match mark {
        MACRON => Some(Tone::High),
        ACUTE => Some(Tone::Rising),
        CARON => Some(Tone::Dipping),
        GRAVE => Some(Tone::Falling),
        _ => None,
    }
}

fn mark_for_tone(tone: Tone) -> Option<char> {
    match tone {
        Tone::High => Some(MACRON),
        Tone::Rising => Some(ACUTE),
        Tone::Dipping => Some(CARON),
        Tone::Falling => Some(GRAVE),
        Tone::Neutral => None,
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'ü' | 'Ü' | 'ê' | 'Ê')
}

/// 给词干加声调符号，轻声不加。
///
/// 位置规则：有 a/e 标在 a/e 上；有 ou 标在 o 上；否则标在最后一个元音上；
/// 没有元音（m / n / ng / hm）标在第一个鼻音上。
pub fn add_tone_mark(stem: &str, tone: Tone) -> String {
    let Some(mark) = mark_for_tone(tone) else {
        return stem.to_string();
    };
    let chars: Vec<char> = stem.chars().collect();
    let lower: Vec<char> = chars.iter().map(|c| c.to_ascii_lowercase()).collect();

    let target = lower
        .iter()
        .position(|&c| c == 'a')
        .or_else(|| lower.iter().position(|&c| c == 'e' || c == 'ê' || c == 'Ê'))
        .or_else(|| lower.windows(2).position(|w| w == ['o', 'u']))
        .or_else(|| chars.iter().rposition(|&c| is_vowel(c)))
        .or_else(|| lower.iter().position(|&c| c == 'm' || c == 'n'));

    let mut out = String::with_capacity(stem.len() + 2);
    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if Some(i) == target {
            out.push(mark);
        }
    }
    out.nfc().collect()
}

// ============================================================
// 单音节解析
// ============================================================

/// 统一 ü 的写法：`u:` → `ü`，`v` → `ü`
pub fn normalize_u(text: &str) -> String {
    text.replace("u:", "ü")
        .replace("U:", "Ü")
        .replace('v', "ü")
        .replace('V', "Ü")
}

/// 解析单个带调音节（数字调或声调符号），不合法返回 None
pub fn parse_syllable(candidate: &str, table: &SyllableTable) -> Option<Syllable> {
    let last = candidate.chars().last()?;
    let (body, tone) = match Tone::from_char(last) {
        Some(tone) => (&candidate[..candidate.len() - last.len_utf8()], Some(tone)),
        None => (candidate, None),
    };
    if body.is_empty() {
        return None;
    }

    // 拆出声调符号，恰好一个
    let mut marks = Vec::new();
    let mut bare = String::with_capacity(body.len());
    for c in body.nfd() {
        match tone_from_mark(c) {
            Some(t) => marks.push(t),
            None => bare.push(c),
        }
    }
    let tone = match (tone, marks.as_slice()) {
        (Some(digit), []) => digit,
        (None, [mark]) => *mark,
        _ => return None,
    };

    let stem: String = normalize_u(&bare).nfc().collect();
    if !stem.chars().all(|c| c.is_ascii_alphabetic() || matches!(c, 'ü' | 'Ü' | 'ê' | 'Ê')) {
        return None;
    }
    if !table.contains(&stem) {
        return None;
    }
    // 单独的 r 只作轻声儿化
    if stem.eq_ignore_ascii_case("r") && tone != Tone::Neutral {
        return None;
    }
    Some(Syllable::new(stem, ToneInfo::plain(tone)))
}

fn erhua_suffix(candidate: &str) -> Option<Syllable> {
    if candidate.eq_ignore_ascii_case("r") {
        Some(Syllable::new(candidate, ToneInfo::plain(Tone::Neutral)))
    } else {
        None
    }
}

// ============================================================
// 自由文本切分
// ============================================================

fn is_tone_mark(c: char) -> bool {
    tone_from_mark(c).is_some() || c == '\u{0308}'
}

/// 可能属于拼音串的字符：ASCII 字母数字、ü、带调拉丁字母（含 ế ề ḿ）、组合符号
fn is_pinyin_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || is_tone_mark(c)
        || ((('\u{00C0}'..='\u{024F}').contains(&c) || ('\u{1E00}'..='\u{1EFF}').contains(&c))
            && c.is_alphabetic())
}

/// 把一段连续的候选串切成带调音节；任一位置失败则整段放弃。
/// 回溯 + 失败记忆，避免贪心误切。
fn split_run(run: &[char], table: &SyllableTable) -> Option<Vec<Syllable>> {
    fn go(
        run: &[char],
        start: usize,
        table: &SyllableTable,
        failed: &mut [bool],
        out: &mut Vec<Syllable>,
    ) -> bool {
        if start == run.len() {
            return true;
        }
        if failed[start] {
            return false;
        }
        let max = (run.len() - start).min(MAX_CANDIDATE_CHARS + 2);
        for len in (1..=max).rev() {
            let candidate: String = run[start..start + len].iter().collect();
            let parsed = parse_syllable(&candidate, table)
                .or_else(|| if out.is_empty() { None } else { erhua_suffix(&candidate) });
            if let Some(syllable) = parsed {
                out.push(syllable);
                if go(run, start + len, table, failed, out) {
                    return true;
                }
                out.pop();
            }
        }
        failed[start] = true;
        false
    }

    let mut failed = vec![false; run.len()];
    let mut out = Vec::new();
    if go(run, 0, table, &mut failed, &mut out) {
        Some(out)
    } else {
        None
    }
}

/// 把自由文本切分为 Token：可识别的拼音串 → Syllable，其余合并为 Text
pub fn tokenize(text: &str, table: &SyllableTable) -> Word {
    let chars: Vec<char> = text.chars().collect();
    let mut word = Word::new();
    let mut pending = String::new();
    let mut i = 0;

    while i < chars.len() {
        if !is_pinyin_char(chars[i]) {
            pending.push(chars[i]);
            i += 1;
            continue;
        }
        // 候选串：拼音字符，以及紧跟 u/U 的冒号
        let start = i;
        while i < chars.len()
            && (is_pinyin_char(chars[i])
                || (chars[i] == ':' && i > start && matches!(chars[i - 1], 'u' | 'U')))
        {
            i += 1;
        }
        let run = &chars[start..i];
        match split_run(run, table) {
            Some(syllables) => {
                word.push(Token::text(std::mem::take(&mut pending)).ok());
                for s in syllables {
                    word.push(Token::Syllable(s));
                }
            }
            None => pending.extend(run),
        }
    }
    word.push(Token::text(pending).ok());
    word
}

/// 解析拼音文本为 Reading：空白单独成词，作为变调的词边界
pub fn parse_reading(text: &str, table: &SyllableTable) -> Reading {
    let mut reading = Reading::new();
    let mut current = Word::new();
    for token in tokenize(text, table) {
        match &token {
            Token::Text(t) if t.text().contains(char::is_whitespace) => {
                for piece in split_keep_whitespace(t.text()) {
                    let is_space = piece.trim().is_empty();
                    if is_space && !current.is_empty() {
                        reading.push(std::mem::take(&mut current));
                    }
                    current.push(Token::text(piece).ok());
                    if is_space {
                        reading.push(std::mem::take(&mut current));
                    }
                }
            }
            _ => current.push(token),
        }
    }
    if !current.is_empty() {
        reading.push(current);
    }
    reading
}

/// "a b" → ["a", " ", "b"]
fn split_keep_whitespace(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;
    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        if in_space.is_some_and(|s| s != space) {
            pieces.push(&text[start..i]);
            start = i;
        }
        in_space = Some(space);
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SyllableTable {
        SyllableTable::new()
    }

    fn syllables(word: &Word) -> Vec<(String, u8)> {
        word.iter()
            .filter_map(|t| match t {
                Token::Syllable(s) => Some((s.stem().to_string(), s.tone().written().digit())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_table() {
        let t = table();
        assert!(t.contains("zhuang"));
        assert!(t.contains("lü"));
        assert!(t.contains("LV"));
        assert!(!t.contains("zhx"));
    }

    #[test]
    fn test_parse_digit_and_mark() {
        let t = table();
        let a = parse_syllable("hao3", &t).unwrap();
        let b = parse_syllable("hǎo", &t).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.tone().written(), Tone::Dipping);
        assert!(parse_syllable("hao", &t).is_none());
        assert!(parse_syllable("xyz3", &t).is_none());
    }

    #[test]
    fn test_two_marks_rejected() {
        assert!(parse_syllable("hǎó", &table()).is_none());
        assert!(parse_syllable("hǎo3", &table()).is_none());
    }

    #[test]
    fn test_u_umlaut_variants() {
        let t = table();
        let forms = ["lu:4", "lv4", "lü4", "lǜ"];
        let parsed: Vec<Syllable> = forms.iter().map(|f| parse_syllable(f, &t).unwrap()).collect();
        for p in &parsed {
            assert_eq!(p.stem(), "lü");
            assert_eq!(p.tone().written(), Tone::Falling);
        }
    }

    #[test]
    fn test_render_round_trip() {
        let t = table();
        for stem in ["lü", "nüe", "zhuang", "xiong", "er", "ou", "gui", "liu", "m"] {
            for tone in Tone::ALL {
                let s = Syllable::new(stem, ToneInfo::plain(tone));
                let numeric = parse_syllable(&s.numeric(), &t).unwrap();
                assert_eq!(numeric.stem(), stem);
                assert_eq!(numeric.tone().written(), tone);
                if tone != Tone::Neutral {
                    let marked = parse_syllable(&s.tonified(), &t).unwrap();
                    assert_eq!(marked.stem(), stem, "{}", s.tonified());
                    assert_eq!(marked.tone().written(), tone);
                }
            }
        }
    }

    #[test]
    fn test_every_stem_round_trips() {
        let t = table();
        for &entry in VALID_SYLLABLES {
            let stem = normalize_u(entry);
            if stem == "r" {
                continue;
            }
            for tone in Tone::ALL {
                let s = Syllable::new(stem.as_str(), ToneInfo::plain(tone));
                let numeric = tokenize(&s.numeric(), &t);
                assert_eq!(syllables(&numeric), vec![(stem.clone(), tone.digit())], "{}", s.numeric());
                if tone == Tone::Neutral {
                    continue;
                }
                let marked = s.tonified();
                assert_eq!(parse_syllable(&marked, &t).as_ref().map(Syllable::stem), Some(stem.as_str()));
                assert_eq!(syllables(&tokenize(&marked, &t)), vec![(stem.clone(), tone.digit())], "{}", marked);
            }
        }
    }

    #[test]
    fn test_bare_r_is_only_erhua() {
        let t = table();
        for tone in ["r1", "r2", "r3", "r4"] {
            assert!(parse_syllable(tone, &t).is_none(), "{}", tone);
        }
        assert!(parse_syllable("r5", &t).unwrap().is_erhua());
        assert!(!tokenize("r2", &t).has_tones());
        let w = tokenize("na3r", &t);
        assert_eq!(syllables(&w), vec![("na".into(), 3), ("r".into(), 5)]);
        assert_eq!(w.flatten(true), "nǎr");
    }

    #[test]
    fn test_e_circumflex_marks() {
        let t = table();
        for (text, tone) in [("ế", 2), ("ề", 4)] {
            assert_eq!(syllables(&tokenize(text, &t)), vec![("ê".into(), tone)], "{}", text);
        }
        assert_eq!(add_tone_mark("ê", Tone::Rising), "ế");
    }

    #[test]
    fn test_mark_placement() {
        assert_eq!(add_tone_mark("hao", Tone::Dipping), "hǎo");
        assert_eq!(add_tone_mark("xian", Tone::High), "xiān");
        assert_eq!(add_tone_mark("gou", Tone::Falling), "gòu");
        assert_eq!(add_tone_mark("liu", Tone::Rising), "liú");
        assert_eq!(add_tone_mark("gui", Tone::Falling), "guì");
        assert_eq!(add_tone_mark("lü", Tone::Falling), "lǜ");
        assert_eq!(add_tone_mark("ma", Tone::Neutral), "ma");
        assert_eq!(add_tone_mark("Zhong", Tone::High), "Zhōng");
    }

    #[test]
    fn test_tokenize_mixed() {
        let t = table();
        let w = tokenize("ni3hao3, world", &t);
        assert_eq!(syllables(&w), vec![("ni".into(), 3), ("hao".into(), 3)]);
        assert_eq!(w.flatten(false), "ni3hao3, world");
        assert_eq!(w.flatten(true), "nǐhǎo, world");
    }

    #[test]
    fn test_tokenize_erhua_suffix() {
        let w = tokenize("nǎr", &table());
        assert_eq!(w.len(), 2);
        assert!(w.tokens()[1].is_erhua());
        assert_eq!(w.flatten(false), "na3r");
    }

    #[test]
    fn test_passthrough() {
        let t = table();
        for text in ["hello world", "café au lait", "2008 年", "a:b", "résumé", ""] {
            let w = tokenize(text, &t);
            assert!(!w.has_tones(), "{}", text);
            assert_eq!(w.flatten(false), text);
        }
    }

    #[test]
    fn test_parse_reading_words() {
        let r = parse_reading("ni3 hao3", &table());
        assert_eq!(r.words().len(), 3);
        assert!(r.words()[1].is_blank());
        assert_eq!(r.flatten(false), "ni3 hao3");
    }
}
