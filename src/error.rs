//! # 错误类型
//!
//! 只有编程错误（违反构造不变量）和推导图环路会以 `Error` 的形式出现；
//! 查询未命中、解析失败等都以 `None` / 纯文本降级处理。

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Text / ToneChar 的内容不能为空
    #[error("empty text payload for {0} token")]
    EmptyText(&'static str),

    /// ToneInfo 的书写调与实际调不能同时缺省
    #[error("tone info needs a written or a spoken tone")]
    MissingTone,

    /// 推导图中出现环路（附带解析链）
    #[error("cycle in field derivation: {0}")]
    Cycle(String),

    /// 配置文件解析失败
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
