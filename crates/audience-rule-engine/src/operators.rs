//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
///
/// 规则中可以写成符号（`=`、`>=`）或单词（`in`、`between`），
/// 不认识的写法在编译阶段报错。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    // 通用比较
    Eq,
    Neq,

    // 数值比较
    Gte,
    Lte,
    Between,

    // 包含检查
    In,
    NotIn,
    Contains,
    ContainsAny,

    // 时间操作
    Before,
    After,
    WithinDays,
}

impl Operator {
    /// 解析规则中的操作符写法
    pub fn parse(token: &str) -> Option<Self> {
        let op = match token.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => Self::Eq,
            "!=" | "<>" | "neq" => Self::Neq,
            ">=" | "gte" => Self::Gte,
            "<=" | "lte" => Self::Lte,
            "between" => Self::Between,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "contains" => Self::Contains,
            "contains_any" => Self::ContainsAny,
            "before" => Self::Before,
            "after" => Self::After,
            "within_days" => Self::WithinDays,
            _ => return None,
        };
        Some(op)
    }

    /// 规范写法，用于描述与序列化回规则
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Between => "between",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::ContainsAny => "contains_any",
            Self::Before => "before",
            Self::After => "after",
            Self::WithinDays => "within_days",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
