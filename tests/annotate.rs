//! 端到端：临时目录里放词典与音频包，走完整的加载 + 字段推导流程

use std::collections::BTreeMap;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;

use pinyin_annotator::dictionary::MeasureWord;
use pinyin_annotator::fields::{is_generated, mark_generated};
use pinyin_annotator::transform::{lighten, tone_sandhi};
use pinyin_annotator::{
    Annotator, Config, Dictionary, Field, MediaPack, NoTranslator, Notice, Script, Token, Tone,
};

const CEDICT: &str = "\
# CC-CEDICT 片段
書 书 [shu1] /book/letter/same as 書經|书经 Book of History/CL:本[ben3],冊|册[ce4],部[bu4],叢|丛[cong2]/
很 很 [hen3] /very/quite/
好 好 [hao3] /good/well/
啤酒 啤酒 [pi2 jiu3] /beer/CL:杯[bei1],瓶[ping2],罐[guan4],桶[tong3],缸[gang1]/
哪兒 哪儿 [na3 r5] /where?/
";

const USER: &str = "\
好 好 [hao3] /fine (user)/
";

fn write_dictionaries(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("cedict_ts.u8"), CEDICT).unwrap();
    std::fs::write(dir.join("dict-user.txt"), USER).unwrap();
}

fn write_pack(media: &Path, name: &str, files: &[&str]) {
    let pack = media.join(name);
    std::fs::create_dir_all(&pack).unwrap();
    for file in files {
        std::fs::write(pack.join(file), b"").unwrap();
    }
}

/// 配置文件 + 相对路径的词典 / 音频目录
fn setup(packs: &[(&str, &[&str])]) -> (tempfile::TempDir, Annotator) {
    let root = tempfile::tempdir().unwrap();
    write_dictionaries(&root.path().join("dictionaries"));
    let media = root.path().join("media");
    std::fs::create_dir_all(&media).unwrap();
    for (name, files) in packs {
        write_pack(&media, name, files);
    }
    let config_path = root.path().join("config.toml");
    std::fs::write(&config_path, "[reading]\ncolorize = false\n").unwrap();

    let config = Config::from_path(&config_path).unwrap();
    let dict = Dictionary::load(&config.dictionary.directory, &config.dictionary.language, true).unwrap();
    let media = MediaPack::discover(&config.audio.media_directory).unwrap();
    (root, Annotator::new(dict, config, media, Box::new(NoTranslator)))
}

fn update(annotator: &Annotator, fields: &[(Field, &str)], seed: u64) -> pinyin_annotator::Update {
    let fields: BTreeMap<Field, String> = fields.iter().map(|(f, v)| (*f, v.to_string())).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    annotator.update_with_rng(&fields, Some(Field::Expression), &mut rng)
}

#[test]
fn hen_hao_sandhi_and_colors() {
    let dict = Dictionary::from_sources(&[CEDICT], false);
    let spoken = tone_sandhi(&dict.reading("很好"));
    let tones: Vec<u8> = spoken.tokens().filter_map(Token::tone).map(|t| t.spoken().digit()).collect();
    assert_eq!(tones, vec![2, 3]);
    let written: Vec<u8> = spoken.tokens().filter_map(Token::tone).map(|t| t.written().digit()).collect();
    assert_eq!(written, vec![3, 3]);

    let annotator = Annotator::new(dict, Config::default(), vec![], Box::new(NoTranslator));
    let reading = annotator.annotate("很好");
    assert_eq!(
        reading.text(Field::Reading),
        Some(
            format!(
                "<span style=\"color:{}\">hěn</span> <span style=\"color:#00aa00\">hǎo</span>",
                lighten("#00aa00")
            )
            .as_str()
        )
    );
    assert_ne!(lighten("#00aa00"), "#00aa00");
}

#[test]
fn na_r_has_no_space_before_erhua() {
    let dict = Dictionary::from_sources(&[CEDICT], false);
    let reading = dict.reading("哪兒");
    let tokens: Vec<&Token> = reading.tokens().collect();
    assert_eq!(tokens.len(), 2);
    match (tokens[0], tokens[1]) {
        (Token::Syllable(na), Token::Syllable(r)) => {
            assert_eq!(na.stem(), "na");
            assert_eq!(na.tone().written(), Tone::Dipping);
            assert!(r.is_erhua());
        }
        other => panic!("unexpected tokens {:?}", other),
    }
    assert_eq!(reading.flatten(true), "nǎr");
}

#[test]
fn shu_measure_words() {
    let dict = Dictionary::from_sources(&[CEDICT], true);
    let meanings = dict.meanings("书", true, Script::Simplified).unwrap();
    assert_eq!(meanings.glosses, vec!["book", "letter", "same as 书经 Book of History"]);
    assert_eq!(
        meanings.measure_words,
        vec![
            MeasureWord::new("本", "ben3"),
            MeasureWord::new("册", "ce4"),
            MeasureWord::new("部", "bu4"),
            MeasureWord::new("丛", "cong2"),
        ]
    );
}

#[test]
fn beer_with_one_pack() {
    let (_root, annotator) = setup(&[("lessons", &["pi2.mp3", "jiu3.MP3", "bei1.ogg", "ping2.mp3"][..])]);
    let result = update(&annotator, &[(Field::Expression, "啤酒")], 1);

    assert_eq!(result.text(Field::Reading), Some("pí jiǔ"));
    assert_eq!(result.text(Field::Audio), Some("[sound:pi2.mp3][sound:jiu3.MP3]"));
    assert_eq!(result.text(Field::Meaning), Some("beer"));
    assert!(result.text(Field::MeasureWordAudio).unwrap().starts_with("[sound:bei1.ogg][sound:ping2.mp3]"));
    // 量词里 guan4 等缺失
    assert!(result
        .notices
        .iter()
        .any(|n| matches!(n, Notice::MissingAudio { field: Field::MeasureWordAudio, .. })));
    assert!(!result.notices.contains(&Notice::NoMediaPacks));
    assert!(result.fields.values().all(|v| is_generated(v)));
}

#[test]
fn beer_without_packs() {
    let (_root, annotator) = setup(&[]);
    let result = update(&annotator, &[(Field::Expression, "啤酒")], 1);

    assert!(result.text(Field::Reading).is_some());
    assert_eq!(result.text(Field::Audio), None);
    assert_eq!(result.text(Field::MeasureWordAudio), None);
    let advisories = result
        .notices
        .iter()
        .filter(|n| matches!(n, Notice::NoMediaPacks | Notice::MissingAudio { .. }))
        .count();
    assert_eq!(advisories, 1);
    assert_eq!(result.notices, vec![Notice::NoMediaPacks]);
}

#[test]
fn user_dictionary_overrides() {
    let (_root, annotator) = setup(&[]);
    let result = update(&annotator, &[(Field::Expression, "好")], 1);
    assert_eq!(result.text(Field::Meaning), Some("fine (user)"));
}

#[test]
fn user_owned_fields_survive() {
    let (_root, annotator) = setup(&[("lessons", &["pi2.mp3", "jiu3.mp3"][..])]);
    let owned: Vec<(Field, &str)> = Field::ALL
        .iter()
        .map(|f| (*f, if *f == Field::Expression { "啤酒" } else { "mine" }))
        .collect();
    for seed in 0..5 {
        let result = update(&annotator, &owned, seed);
        assert!(result.fields.is_empty(), "{:?}", result.fields);
    }
}

#[test]
fn stale_generated_fields_are_replaced() {
    let (_root, annotator) = setup(&[("lessons", &["hen3.mp3"][..])]);
    let stale_reading = mark_generated("pí jiǔ");
    let stale_audio = mark_generated("[sound:pi2.mp3][sound:jiu3.mp3]");
    let result = update(
        &annotator,
        &[
            (Field::Expression, "很"),
            (Field::Reading, stale_reading.as_str()),
            (Field::Audio, stale_audio.as_str()),
            (Field::Meaning, "my note"),
        ],
        1,
    );
    assert_eq!(result.text(Field::Reading), Some("hěn"));
    assert_eq!(result.text(Field::Audio), Some("[sound:hen3.mp3]"));
    assert!(!result.fields.contains_key(&Field::Meaning));
}
