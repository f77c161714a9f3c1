//! # 读音变换
//!
//! 纯函数，输入输出都是新的 `Reading` / `Word`：
//! - 声调符号化 (tonify)
//! - 按声调上色 (colorize)，变调音节颜色变浅
//! - 三声变调 (tone sandhi)
//! - 去儿化 (erhua trim)
//! - 释义中遮盖汉字 (hanzi masking)

use serde::Deserialize;

use crate::dictionary::is_hanzi;
use crate::model::{Attrs, Reading, Text, Tone, ToneChar, ToneInfo, Token, Word};

/// 上色依据：书写调或实际调
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorBasis {
    #[default]
    Written,
    Spoken,
}

// ============================================================
// 声调符号化
// ============================================================

/// 音节换成带声调符号的纯文本，保留显示属性
pub fn tonify(reading: &Reading) -> Reading {
    reading.concat_map(|token| match token {
        Token::Syllable(s) => Text::with_attrs(s.tonified(), s.attrs().clone()).ok().map(Token::Text),
        other => Some(other.clone()),
    })
}

// ============================================================
// 上色
// ============================================================

/// 给每个音节 / 带调汉字加颜色；实际调与书写调不同时颜色变浅
pub fn colorize(reading: &Reading, palette: &[String], basis: ColorBasis) -> Reading {
    reading.map_words(|word| colorize_word(word, palette, basis))
}

pub fn colorize_word(word: &Word, palette: &[String], basis: ColorBasis) -> Word {
    word.map(|token| {
        let Some(tone) = token.tone() else {
            return token.clone();
        };
        let index = match basis {
            ColorBasis::Written => tone.written().index(),
            ColorBasis::Spoken => tone.spoken().index(),
        };
        let Some(base) = palette.get(index) else {
            return token.clone();
        };
        let color = if tone.is_sandhi() { lighten(base) } else { base.clone() };
        token.clone().with_attrs(Attrs::colored(color))
    })
}

fn parse_hex(color: &str) -> Option<(f64, f64, f64)> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok().map(|v| v as f64 / 255.0);
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    (r + m, g + m, b + m)
}

/// 饱和度减半、明度 +20%（上限 1）；无法解析的颜色原样返回
pub fn lighten(color: &str) -> String {
    let Some((r, g, b)) = parse_hex(color) else {
        return color.to_string();
    };
    let (h, s, v) = rgb_to_hsv(r, g, b);
    let (r, g, b) = hsv_to_rgb(h, s / 2.0, (v * 1.2).min(1.0));
    let byte = |x: f64| (x * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", byte(r), byte(g), byte(b))
}

// ============================================================
// 三声变调
// ============================================================

/// 调型槽位：声调数字 / 非声调占位 / 词边界
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Tone(u8),
    Placeholder,
    Boundary,
}

/// 收集调型：每个 Word 一组，组间为边界；空白不计，非空白文本记占位
fn contour(reading: &Reading) -> Vec<Vec<Slot>> {
    reading
        .words()
        .iter()
        .map(|word| {
            word.iter()
                .filter_map(|token| match token {
                    Token::Syllable(_) | Token::ToneChar(_) => {
                        token.tone().map(|t| Slot::Tone(t.written().digit()))
                    }
                    Token::Text(t) if t.is_blank() => None,
                    Token::Text(_) => Some(Slot::Placeholder),
                })
                .collect::<Vec<_>>()
        })
        .filter(|group| !group.is_empty())
        .collect()
}

fn all_third(group: &[Slot]) -> bool {
    !group.is_empty() && group.iter().all(|s| *s == Slot::Tone(3))
}

fn set_second(slot: &mut Slot) {
    if *slot == Slot::Tone(3) {
        *slot = Slot::Tone(2);
    }
}

/// 调型改写，两遍：
/// 1. 由边界相连的全三声组，若末组有两个及以上三声：
///    非末组中多于一个音节的组全改二声，末组除最后一个外改二声
/// 2. 剩余相邻的三声对（最多隔一个边界，不能隔占位）前一个改二声
fn rewrite(mut groups: Vec<Vec<Slot>>) -> Vec<Slot> {
    let mut i = 0;
    while i < groups.len() {
        if !all_third(&groups[i]) {
            i += 1;
            continue;
        }
        let mut end = i;
        while end + 1 < groups.len() && all_third(&groups[end + 1]) {
            end += 1;
        }
        if groups[end].len() >= 2 {
            for group in &mut groups[i..end] {
                if group.len() > 1 {
                    group.iter_mut().for_each(set_second);
                }
            }
            let last = groups[end].len() - 1;
            groups[end][..last].iter_mut().for_each(set_second);
        }
        i = end + 1;
    }

    let mut flat = Vec::new();
    for (n, group) in groups.into_iter().enumerate() {
        if n > 0 {
            flat.push(Slot::Boundary);
        }
        flat.extend(group);
    }

    let snapshot = flat.clone();
    for i in 0..snapshot.len() {
        if snapshot[i] != Slot::Tone(3) {
            continue;
        }
        let mut j = i + 1;
        if snapshot.get(j) == Some(&Slot::Boundary) {
            j += 1;
        }
        if snapshot.get(j) == Some(&Slot::Tone(3)) {
            flat[i] = Slot::Tone(2);
        }
    }
    flat
}

/// 三声变调：改写结果写入每个音节的实际调，书写调不变
pub fn tone_sandhi(reading: &Reading) -> Reading {
    let mut spoken = rewrite(contour(reading)).into_iter().filter_map(|slot| match slot {
        Slot::Tone(d) => Tone::from_digit(d as u32),
        Slot::Placeholder | Slot::Boundary => None,
    });
    reading.map(|token| match token.tone() {
        Some(_) => match spoken.next() {
            Some(tone) => token.clone().with_spoken(tone),
            None => token.clone(),
        },
        None => token.clone(),
    })
}

// ============================================================
// 去儿化 / 遮盖汉字
// ============================================================

/// 去掉所有儿化后缀音节
pub fn trim_erhua(reading: &Reading) -> Reading {
    reading.concat_map(|token| if token.is_erhua() { None } else { Some(token.clone()) })
}

/// 把 Text / ToneChar 中出现的 `span` 换成占位符
pub fn mask_hanzi(word: &Word, span: &str, placeholder: &str) -> Word {
    if span.is_empty() {
        return word.clone();
    }
    word.concat_map(|token| match token {
        Token::Text(t) if t.text().contains(span) => {
            Text::with_attrs(t.text().replace(span, placeholder), t.attrs().clone())
                .ok()
                .map(Token::Text)
        }
        Token::ToneChar(c) if c.ch() == span => {
            Text::with_attrs(placeholder, c.attrs().clone()).ok().map(Token::Text)
        }
        other => Some(other.clone()),
    })
}

/// 把表达式的汉字与读音音节逐个对齐为 ToneChar；数量不一致时返回 None
pub fn tone_chars(expression: &str, reading: &Reading) -> Option<Word> {
    let tones: Vec<ToneInfo> = reading.tokens().filter_map(Token::tone).collect();
    let count = expression.chars().filter(|c| is_hanzi(*c)).count();
    if count == 0 || count != tones.len() {
        return None;
    }

    let mut tones = tones.into_iter();
    let mut word = Word::new();
    let mut pending = String::new();
    for ch in expression.chars() {
        if !is_hanzi(ch) {
            pending.push(ch);
            continue;
        }
        word.push(Token::text(std::mem::take(&mut pending)).ok());
        let tone = tones.next()?;
        word.push(ToneChar::new(ch.to_string(), tone).ok().map(Token::ToneChar));
    }
    word.push(Token::text(pending).ok());
    Some(word)
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pinyin::{parse_reading, SyllableTable};

    fn reading(text: &str) -> Reading {
        parse_reading(text, &SyllableTable::new())
    }

    fn spoken(r: &Reading) -> Vec<u8> {
        r.tokens().filter_map(Token::tone).map(|t| t.spoken().digit()).collect()
    }

    fn palette() -> Vec<String> {
        ["#ff0000", "#ffaa00", "#00aa00", "#0000ff", "#545454"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_sandhi_pair() {
        assert_eq!(spoken(&tone_sandhi(&reading("hen3 hao3"))), vec![2, 3]);
        assert_eq!(spoken(&tone_sandhi(&reading("ni3hao3"))), vec![2, 3]);
    }

    #[test]
    fn test_sandhi_run_of_three() {
        assert_eq!(spoken(&tone_sandhi(&reading("zhan3lan3guan3"))), vec![2, 2, 3]);
        assert_eq!(spoken(&tone_sandhi(&reading("wo3 hen3 hao3"))), vec![2, 2, 3]);
    }

    #[test]
    fn test_sandhi_grouped_run() {
        // 末组两个三声：非末组只改多音节组
        assert_eq!(spoken(&tone_sandhi(&reading("lao3hu3 xiao3gou3"))), vec![2, 2, 2, 3]);
        assert_eq!(spoken(&tone_sandhi(&reading("wo3 xiao3gou3"))), vec![3, 2, 3]);
    }

    #[test]
    fn test_sandhi_blocked_by_text() {
        assert_eq!(spoken(&tone_sandhi(&reading("hao3, hao3"))), vec![3, 3]);
        assert_eq!(spoken(&tone_sandhi(&reading("hao3 ma ma3"))), vec![3, 3]);
    }

    #[test]
    fn test_sandhi_leaves_other_tones() {
        let r = reading("ni3 shi4 lao3shi1");
        assert_eq!(spoken(&tone_sandhi(&r)), vec![3, 4, 3, 1]);
    }

    #[test]
    fn test_sandhi_idempotent_on_second_tone() {
        let r = reading("ren2 min2 yin2hang2");
        let once = tone_sandhi(&r);
        assert_eq!(once, r);
        assert_eq!(tone_sandhi(&once), once);
    }

    #[test]
    fn test_sandhi_keeps_written() {
        let r = tone_sandhi(&reading("hen3 hao3"));
        let written: Vec<u8> = r.tokens().filter_map(Token::tone).map(|t| t.written().digit()).collect();
        assert_eq!(written, vec![3, 3]);
    }

    #[test]
    fn test_colorize_sandhi_lightened() {
        let r = colorize(&tone_sandhi(&reading("hen3 hao3")), &palette(), ColorBasis::Written);
        let colors: Vec<String> = r
            .tokens()
            .filter(|t| t.tone().is_some())
            .map(|t| t.attrs().color.clone().unwrap())
            .collect();
        assert_eq!(colors, vec![lighten("#00aa00"), "#00aa00".to_string()]);
    }

    #[test]
    fn test_colorize_spoken_basis() {
        let r = colorize(&tone_sandhi(&reading("hen3 hao3")), &palette(), ColorBasis::Spoken);
        let first = r.tokens().find(|t| t.tone().is_some()).unwrap();
        assert_eq!(first.attrs().color.as_deref(), Some(lighten("#ffaa00").as_str()));
    }

    #[test]
    fn test_lighten() {
        // 纯红: s 1→0.5, v 1→1
        assert_eq!(lighten("#ff0000"), "#ff8080");
        // 灰色没有饱和度，只提亮
        assert_eq!(lighten("#545454"), "#656565");
        assert_eq!(lighten("red"), "red");
    }

    #[test]
    fn test_tonify_keeps_attrs() {
        let r = colorize(&reading("ma1"), &palette(), ColorBasis::Written);
        let t = tonify(&r);
        let first = t.tokens().next().unwrap();
        match first {
            Token::Text(text) => {
                assert_eq!(text.text(), "mā");
                assert_eq!(text.attrs().color.as_deref(), Some("#ff0000"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_trim_erhua() {
        let r = reading("na3r zhe4r5 er2");
        let trimmed = trim_erhua(&r);
        assert_eq!(trimmed.flatten(false), "na3 zhe4 er2");
        assert_eq!(trim_erhua(&trimmed), trimmed);
    }

    #[test]
    fn test_mask_hanzi() {
        let w: Word = vec![
            Token::text("same as 书经 book").unwrap(),
            Token::ToneChar(ToneChar::new("书", ToneInfo::plain(Tone::High)).unwrap()),
            Token::syllable("shu", Tone::High),
        ]
        .into_iter()
        .collect();
        let masked = mask_hanzi(&w, "书", "㊥");
        assert_eq!(masked.flatten(false), "same as ㊥经 book㊥shu1");
    }

    #[test]
    fn test_tone_chars() {
        let r = reading("hen3 hao3");
        let w = tone_chars("很好!", &r).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w.flatten(false), "很好!");
        assert!(tone_chars("很", &r).is_none());
    }
}
