//! # pinyin-annotator - 汉字注音引擎
//!
//! 词典分词出读音，做三声变调与声调着色，按音节匹配录音，
//! 再由推导图把这些结果填进宿主笔记的各个字段。

pub mod config;
pub mod dictionary;
pub mod error;
pub mod fields;
pub mod format;
pub mod graph;
pub mod media;
pub mod model;
pub mod pinyin;
pub mod transform;
pub mod translate;

pub use config::Config;
pub use dictionary::{Dictionary, Script};
pub use error::{Error, Result};
pub use fields::{Annotator, Field, Notice, Update, GENERATED_MARKER};
pub use media::MediaPack;
pub use model::{Reading, Syllable, Text, Tone, ToneChar, ToneInfo, Token, Word};
pub use translate::{GoogleTranslator, NoTranslator, Translator};
