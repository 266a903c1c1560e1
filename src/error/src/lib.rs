//! 模拟引擎错误处理模块
//!
//! 分为两类：
//! - `ContentError`：静态内容定义缺失或格式错误，在任何回合运行之前抛出
//! - `GameError`：会话级错误，包括存档编解码、版本不兼容和状态损坏
//!
//! 动作执行过程中的错误不会出现在这里，它们在动作边界被转换为失败结果。

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

/// 静态内容校验错误（致命，加载阶段）
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ContentError {
    /// 引用了不存在的怪物定义
    #[error("unknown monster id: {0}")]
    UnknownMonster(String),

    /// 引用了不存在的矿石定义
    #[error("unknown ore id: {0}")]
    UnknownOre(String),

    /// 引用了不存在的配方
    #[error("unknown recipe id: {0}")]
    UnknownRecipe(String),

    /// 引用了不存在的物品定义
    #[error("unknown item id: {0}")]
    UnknownItem(String),

    /// 引用了不存在的掉落表
    #[error("unknown loot table: {0}")]
    UnknownLootTable(String),

    /// 公式使用了未声明的输入名
    #[error("formula `{formula}` references unknown input `{input}`")]
    UnknownFormulaInput { formula: String, input: String },

    /// 权重表为空或权重总和不为正
    #[error("weight table `{0}` has no positive weights")]
    EmptyWeightTable(String),

    /// 定义本身不合法
    #[error("invalid definition `{id}`: {reason}")]
    InvalidDefinition { id: String, reason: String },
}

/// 会话运行过程中可能出现的错误类型
#[derive(Debug, Error)]
pub enum GameError {
    /// 内容校验失败
    #[error("Content validation error: {0}")]
    Content(#[from] ContentError),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 反序列化错误
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// 存档数据损坏
    #[error("Corrupted save data: {0}")]
    CorruptedSave(String),

    /// 存档版本不兼容
    #[error("Incompatible save version: {0}")]
    VersionMismatch(u32),

    /// 游戏状态无效
    #[error("Invalid game state: {0}")]
    InvalidGameState(String),

    /// 其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DecodeError> for GameError {
    fn from(err: DecodeError) -> Self {
        // 长度或 utf-8 损坏通常意味着存档被截断
        match err {
            DecodeError::UnexpectedEnd { .. } | DecodeError::Utf8 { .. } => {
                GameError::CorruptedSave(err.to_string())
            }
            other => GameError::DeserializationError(other.to_string()),
        }
    }
}

impl From<EncodeError> for GameError {
    fn from(err: EncodeError) -> Self {
        GameError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for GameError {
    fn from(err: serde_json::Error) -> Self {
        GameError::DeserializationError(err.to_string())
    }
}

/// 将错误转换为可以写入消息日志的简短描述
pub fn handle_error(error: &GameError) -> String {
    match error {
        GameError::Content(e) => format!("content error: {e}"),
        GameError::CorruptedSave(_) => "save data is corrupted".to_string(),
        GameError::VersionMismatch(v) => format!("save version {v} is not supported"),
        _ => error.to_string(),
    }
}
