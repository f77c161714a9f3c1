//! # pinyin-annotate - 命令行入口
//!
//! 加载配置、词典与音频包，补全字段后以 JSON 输出到 stdout。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use pinyin_annotator::{Annotator, Config, Dictionary, Field, GoogleTranslator, MediaPack, NoTranslator, Translator};

#[derive(Parser, Debug)]
#[command(name = "pinyin-annotate")]
#[command(about = "汉字注音：补全笔记字段并输出 JSON")]
#[command(version)]
struct Args {
    /// 配置文件（默认读取可执行文件旁的 config.toml）
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 音频包并列时的随机种子
    #[arg(long)]
    seed: Option<u64>,

    /// 已有字段内容，可重复
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    set: Vec<(Field, String)>,

    /// 宿主报告刚被修改的字段（给出表达式时默认 expression）
    #[arg(long, value_name = "FIELD", value_parser = parse_field)]
    changed: Option<Field>,

    /// 表达式，多个词以空格连接
    #[arg(required_unless_present = "set")]
    expression: Vec<String>,
}

impl Args {
    fn fields(&self) -> BTreeMap<Field, String> {
        let mut fields: BTreeMap<Field, String> = self.set.iter().cloned().collect();
        if !self.expression.is_empty() {
            fields.insert(Field::Expression, self.expression.join(" "));
        }
        fields
    }

    fn changed(&self) -> Option<Field> {
        match self.changed {
            Some(field) => Some(field),
            None if !self.expression.is_empty() => Some(Field::Expression),
            None => None,
        }
    }
}

fn parse_field(name: &str) -> std::result::Result<Field, String> {
    Field::from_name(name).ok_or_else(|| format!("未知字段 {:?}", name))
}

fn parse_assignment(pair: &str) -> std::result::Result<(Field, String), String> {
    let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("需要 FIELD=VALUE，得到 {:?}", pair))?;
    Ok((parse_field(name)?, value.to_string()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load(),
    };
    let dict = Dictionary::load(&config.dictionary.directory, &config.dictionary.language, true)?;
    let media = MediaPack::discover(&config.audio.media_directory)?;
    let translator: Box<dyn Translator> = if config.meaning.fallback_translation {
        Box::new(GoogleTranslator::new(Duration::from_secs(config.meaning.translation_timeout_secs)))
    } else {
        Box::new(NoTranslator)
    };

    let annotator = Annotator::new(dict, config, media, translator);
    let fields = args.fields();
    let update = match args.seed {
        Some(seed) => {
            info!("seed {}", seed);
            let mut rng = StdRng::seed_from_u64(seed);
            annotator.update_with_rng(&fields, args.changed(), &mut rng)
        }
        None => annotator.update(&fields, args.changed()),
    };

    println!("{}", serde_json::to_string_pretty(&update)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("pinyin-annotate").chain(list.iter().copied()))
    }

    #[test]
    fn test_parse_args() {
        let a = args(&["--seed", "7", "--set", "trad=書", "很", "好"]).unwrap();
        assert_eq!(a.seed, Some(7));
        let fields = a.fields();
        assert_eq!(fields[&Field::Traditional], "書");
        assert_eq!(fields[&Field::Expression], "很 好");
        assert_eq!(a.changed(), Some(Field::Expression));

        let a = args(&["--set", "reading=hao3", "--changed", "Reading"]).unwrap();
        assert_eq!(a.changed(), Some(Field::Reading));
        assert!(!a.fields().contains_key(&Field::Expression));

        let a = args(&["--set", "meaning=a=b"]).unwrap();
        assert_eq!(a.fields()[&Field::Meaning], "a=b");
        assert_eq!(a.changed(), None);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["--seed", "x", "好"]).is_err());
        assert!(args(&["--set", "pinyin=hao3"]).is_err());
        assert!(args(&["--set", "reading"]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&["--changed", "nope", "好"]).is_err());
    }

    #[test]
    fn test_command_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
