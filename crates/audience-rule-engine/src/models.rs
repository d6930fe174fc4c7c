//! 规则引擎领域模型
//!
//! `AudienceRuleSpec` 是管理端提交的原始规则，`AudienceRule` 是编译后的规则：
//! 每个条件都已经落到封闭的 `RuleLeaf` 变体上，值的类型在构造时确定。

use campaign_shared::models::Platform;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::compiler::RuleCompiler;
use crate::error::{Result, RuleError};
use crate::operators::Operator;

/// 原始条件
///
/// 操作符字段可以写作 `op` 或 `operator`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCondition {
    pub field: String,
    #[serde(alias = "operator")]
    pub op: String,
    #[serde(default)]
    pub value: Value,
}

impl RawCondition {
    pub fn new(field: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value: value.into(),
        }
    }
}

/// 原始受众规则
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudienceRuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<Vec<RawCondition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any: Option<Vec<RawCondition>>,
}

impl AudienceRuleSpec {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn with_all(mut self, condition: RawCondition) -> Self {
        self.all.get_or_insert_with(Vec::new).push(condition);
        self
    }

    pub fn with_any(mut self, condition: RawCondition) -> Self {
        self.any.get_or_insert_with(Vec::new).push(condition);
        self
    }
}

/// 编译后的规则叶子
///
/// 每个白名单中的（字段, 操作符）组合对应一个变体。
/// 布尔字段的 `!=` 在编译时被规范化为取反后的相等判断。
#[derive(Debug, Clone, PartialEq)]
pub enum RuleLeaf {
    IsVerified(bool),
    IsPremium(bool),
    HasProfilePicture(bool),
    GenderEq(String),
    GenderNeq(String),
    GenderIn(Vec<String>),
    CountryEq(String),
    CountryIn(Vec<String>),
    CountryNotIn(Vec<String>),
    CityEq(String),
    CityIn(Vec<String>),
    AgeGte(u32),
    AgeLte(u32),
    AgeBetween { min: u32, max: u32 },
    JoinedBefore(DateTime<Utc>),
    JoinedAfter(DateTime<Utc>),
    LastActiveBefore(DateTime<Utc>),
    LastActiveAfter(DateTime<Utc>),
    LastActiveWithinDays(u32),
    InterestsContains(String),
    InterestsContainsAny(Vec<String>),
    PlatformEq(Platform),
    /// 资料完整度，计算字段
    ProfileComplete(bool),
}

impl RuleLeaf {
    /// 计算字段不能下推到目录查询，只能在候选集上后置过滤
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::ProfileComplete(_))
    }

    pub fn field(&self) -> &'static str {
        match self {
            Self::IsVerified(_) => "is_verified",
            Self::IsPremium(_) => "is_premium",
            Self::HasProfilePicture(_) => "has_profile_picture",
            Self::GenderEq(_) | Self::GenderNeq(_) | Self::GenderIn(_) => "gender",
            Self::CountryEq(_) | Self::CountryIn(_) | Self::CountryNotIn(_) => "country",
            Self::CityEq(_) | Self::CityIn(_) => "city",
            Self::AgeGte(_) | Self::AgeLte(_) | Self::AgeBetween { .. } => "age",
            Self::JoinedBefore(_) | Self::JoinedAfter(_) => "date_joined",
            Self::LastActiveBefore(_) | Self::LastActiveAfter(_) | Self::LastActiveWithinDays(_) => {
                "last_active"
            }
            Self::InterestsContains(_) | Self::InterestsContainsAny(_) => "interests",
            Self::PlatformEq(_) => "platform",
            Self::ProfileComplete(_) => "profile_complete",
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            Self::IsVerified(_)
            | Self::IsPremium(_)
            | Self::HasProfilePicture(_)
            | Self::GenderEq(_)
            | Self::CountryEq(_)
            | Self::CityEq(_)
            | Self::PlatformEq(_)
            | Self::ProfileComplete(_) => Operator::Eq,
            Self::GenderNeq(_) => Operator::Neq,
            Self::GenderIn(_) | Self::CountryIn(_) | Self::CityIn(_) => Operator::In,
            Self::CountryNotIn(_) => Operator::NotIn,
            Self::AgeGte(_) => Operator::Gte,
            Self::AgeLte(_) => Operator::Lte,
            Self::AgeBetween { .. } => Operator::Between,
            Self::JoinedBefore(_) | Self::LastActiveBefore(_) => Operator::Before,
            Self::JoinedAfter(_) | Self::LastActiveAfter(_) => Operator::After,
            Self::LastActiveWithinDays(_) => Operator::WithinDays,
            Self::InterestsContains(_) => Operator::Contains,
            Self::InterestsContainsAny(_) => Operator::ContainsAny,
        }
    }

    /// 规范化后的值，用于描述和序列化
    pub fn value(&self) -> Value {
        let ts = |t: &DateTime<Utc>| Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true));
        match self {
            Self::IsVerified(b)
            | Self::IsPremium(b)
            | Self::HasProfilePicture(b)
            | Self::ProfileComplete(b) => json!(b),
            Self::GenderEq(s)
            | Self::GenderNeq(s)
            | Self::CountryEq(s)
            | Self::CityEq(s)
            | Self::InterestsContains(s) => json!(s),
            Self::GenderIn(list)
            | Self::CountryIn(list)
            | Self::CountryNotIn(list)
            | Self::CityIn(list)
            | Self::InterestsContainsAny(list) => json!(list),
            Self::AgeGte(n) | Self::AgeLte(n) | Self::LastActiveWithinDays(n) => json!(n),
            Self::AgeBetween { min, max } => json!([min, max]),
            Self::JoinedBefore(t)
            | Self::JoinedAfter(t)
            | Self::LastActiveBefore(t)
            | Self::LastActiveAfter(t) => ts(t),
            Self::PlatformEq(p) => json!(p.as_str()),
        }
    }

    pub fn to_condition(&self) -> RawCondition {
        RawCondition::new(self.field(), self.operator().symbol(), self.value())
    }
}

impl std::fmt::Display for RuleLeaf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field(), self.operator(), self.value())
    }
}

/// 编译后的受众规则
///
/// 序列化形式与 `AudienceRuleSpec` 相同，反序列化时重新走白名单校验，
/// 因此持久化的规则不会绕过构造期校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AudienceRuleSpec", into = "AudienceRuleSpec")]
pub struct AudienceRule {
    all: Vec<RuleLeaf>,
    any: Vec<RuleLeaf>,
}

impl AudienceRule {
    /// 直接由已构造的叶子组成规则
    pub fn new(all: Vec<RuleLeaf>, any: Vec<RuleLeaf>) -> Result<Self> {
        if all.is_empty() && any.is_empty() {
            return Err(RuleError::EmptyRule);
        }
        Ok(Self { all, any })
    }

    pub fn all(&self) -> &[RuleLeaf] {
        &self.all
    }

    pub fn any(&self) -> &[RuleLeaf] {
        &self.any
    }

    pub fn has_computed(&self) -> bool {
        self.all.iter().chain(self.any.iter()).any(RuleLeaf::is_computed)
    }

    /// 规则涉及的字段（去重，保持首次出现顺序）
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        for leaf in self.all.iter().chain(self.any.iter()) {
            if !fields.contains(&leaf.field()) {
                fields.push(leaf.field());
            }
        }
        fields
    }

    /// 人类可读的规则摘要
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.all.is_empty() {
            let clauses: Vec<String> = self.all.iter().map(ToString::to_string).collect();
            parts.push(format!("满足全部: [{}]", clauses.join(" AND ")));
        }
        if !self.any.is_empty() {
            let clauses: Vec<String> = self.any.iter().map(ToString::to_string).collect();
            parts.push(format!("满足任一: [{}]", clauses.join(" OR ")));
        }
        parts.push("且至少有一台活跃设备".to_string());
        parts.join("; ")
    }
}

impl TryFrom<AudienceRuleSpec> for AudienceRule {
    type Error = RuleError;

    fn try_from(spec: AudienceRuleSpec) -> Result<Self> {
        RuleCompiler::new().compile(&spec)
    }
}

impl From<AudienceRule> for AudienceRuleSpec {
    fn from(rule: AudienceRule) -> Self {
        let group = |leaves: &[RuleLeaf]| -> Option<Vec<RawCondition>> {
            (!leaves.is_empty()).then(|| leaves.iter().map(RuleLeaf::to_condition).collect())
        };
        Self {
            all: group(&rule.all),
            any: group(&rule.any),
        }
    }
}

/// 受众评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceResult {
    /// 命中的接收人 ID，按 ID 升序
    pub recipient_ids: Vec<String>,
    pub count: usize,
    /// 前 N 个接收人 ID，供管理端抽查
    pub sample_ids: Vec<String>,
    pub description: String,
    pub evaluated_at: DateTime<Utc>,
}
