//! 规则编译器
//!
//! 按封闭白名单把原始条件编译成 `RuleLeaf`。字段、操作符和值的类型都在这里校验，
//! 评估阶段不再处理任何非法输入。

use campaign_shared::models::Platform;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use crate::error::{Result, RuleError};
use crate::models::{AudienceRule, AudienceRuleSpec, RawCondition, RuleLeaf};
use crate::operators::Operator;

/// 白名单字段定义
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub operators: &'static [Operator],
    /// 计算字段只能作为后置过滤条件
    pub computed: bool,
}

const fn field(name: &'static str, operators: &'static [Operator]) -> FieldSpec {
    FieldSpec {
        name,
        operators,
        computed: false,
    }
}

/// 受众规则白名单
pub const WHITELIST: &[FieldSpec] = &[
    field("is_verified", &[Operator::Eq, Operator::Neq]),
    field("is_premium", &[Operator::Eq, Operator::Neq]),
    field("has_profile_picture", &[Operator::Eq]),
    field("gender", &[Operator::Eq, Operator::Neq, Operator::In]),
    field("country", &[Operator::Eq, Operator::In, Operator::NotIn]),
    field("city", &[Operator::Eq, Operator::In]),
    field("age", &[Operator::Gte, Operator::Lte, Operator::Between]),
    field("date_joined", &[Operator::Before, Operator::After]),
    field(
        "last_active",
        &[Operator::Before, Operator::After, Operator::WithinDays],
    ),
    field("interests", &[Operator::Contains, Operator::ContainsAny]),
    field("platform", &[Operator::Eq]),
    FieldSpec {
        name: "profile_complete",
        operators: &[Operator::Eq],
        computed: true,
    },
];

/// 规则编译器
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleCompiler;

impl RuleCompiler {
    pub fn new() -> Self {
        Self
    }

    /// 查找白名单字段
    pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
        WHITELIST.iter().find(|f| f.name == name)
    }

    /// 从 JSON 字符串编译规则
    pub fn compile_from_json(&self, json: &str) -> Result<AudienceRule> {
        let spec = AudienceRuleSpec::from_json(json)?;
        self.compile(&spec)
    }

    /// 编译规则
    ///
    /// `all` 与 `any` 都缺失或为空时返回 `EmptyRule`。
    pub fn compile(&self, spec: &AudienceRuleSpec) -> Result<AudienceRule> {
        let all = self.compile_group(spec.all.as_deref())?;
        let any = self.compile_group(spec.any.as_deref())?;
        AudienceRule::new(all, any)
    }

    fn compile_group(&self, conditions: Option<&[RawCondition]>) -> Result<Vec<RuleLeaf>> {
        conditions
            .unwrap_or_default()
            .iter()
            .map(|c| self.compile_condition(c))
            .collect()
    }

    /// 编译单个条件
    pub fn compile_condition(&self, cond: &RawCondition) -> Result<RuleLeaf> {
        let name = cond.field.trim();
        let spec = Self::field_spec(name).ok_or_else(|| RuleError::DisallowedField {
            field: cond.field.clone(),
        })?;

        let op = Operator::parse(&cond.op)
            .filter(|op| spec.operators.contains(op))
            .ok_or_else(|| RuleError::DisallowedOperator {
                field: spec.name.to_string(),
                operator: cond.op.clone(),
            })?;

        let v = ValueReader {
            field: spec.name,
            op,
            value: &cond.value,
        };

        let leaf = match (spec.name, op) {
            ("is_verified", Operator::Eq) => RuleLeaf::IsVerified(v.boolean()),
            ("is_verified", Operator::Neq) => RuleLeaf::IsVerified(!v.boolean()),
            ("is_premium", Operator::Eq) => RuleLeaf::IsPremium(v.boolean()),
            ("is_premium", Operator::Neq) => RuleLeaf::IsPremium(!v.boolean()),
            ("has_profile_picture", Operator::Eq) => RuleLeaf::HasProfilePicture(v.boolean()),
            ("gender", Operator::Eq) => RuleLeaf::GenderEq(v.string()?),
            ("gender", Operator::Neq) => RuleLeaf::GenderNeq(v.string()?),
            ("gender", Operator::In) => RuleLeaf::GenderIn(v.string_list()?),
            ("country", Operator::Eq) => RuleLeaf::CountryEq(v.string()?),
            ("country", Operator::In) => RuleLeaf::CountryIn(v.string_list()?),
            ("country", Operator::NotIn) => RuleLeaf::CountryNotIn(v.string_list()?),
            ("city", Operator::Eq) => RuleLeaf::CityEq(v.string()?),
            ("city", Operator::In) => RuleLeaf::CityIn(v.string_list()?),
            ("age", Operator::Gte) => RuleLeaf::AgeGte(v.count()?),
            ("age", Operator::Lte) => RuleLeaf::AgeLte(v.count()?),
            ("age", Operator::Between) => {
                let (min, max) = v.range()?;
                RuleLeaf::AgeBetween { min, max }
            }
            ("date_joined", Operator::Before) => RuleLeaf::JoinedBefore(v.datetime()?),
            ("date_joined", Operator::After) => RuleLeaf::JoinedAfter(v.datetime()?),
            ("last_active", Operator::Before) => RuleLeaf::LastActiveBefore(v.datetime()?),
            ("last_active", Operator::After) => RuleLeaf::LastActiveAfter(v.datetime()?),
            ("last_active", Operator::WithinDays) => RuleLeaf::LastActiveWithinDays(v.count()?),
            ("interests", Operator::Contains) => RuleLeaf::InterestsContains(v.string()?),
            ("interests", Operator::ContainsAny) => RuleLeaf::InterestsContainsAny(v.string_list()?),
            ("platform", Operator::Eq) => RuleLeaf::PlatformEq(v.platform()?),
            ("profile_complete", Operator::Eq) => RuleLeaf::ProfileComplete(v.boolean()),
            _ => {
                return Err(RuleError::DisallowedOperator {
                    field: spec.name.to_string(),
                    operator: cond.op.clone(),
                });
            }
        };

        Ok(leaf)
    }
}

/// 布尔值强制转换
///
/// 接受 `true/false`、`1/0` 以及不区分大小写的 `"true"/"false"`，
/// 其余值按真值性判断：null、0、空字符串、空数组、空对象为假。
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            if s.eq_ignore_ascii_case("true") {
                true
            } else if s.eq_ignore_ascii_case("false") {
                false
            } else {
                !s.is_empty()
            }
        }
        Value::Null => false,
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// 解析日期时间，支持 RFC 3339 和纯日期（按 UTC 零点）
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// 获取值的类型名称
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 条件值读取器，出错时带上字段与操作符
struct ValueReader<'a> {
    field: &'static str,
    op: Operator,
    value: &'a Value,
}

impl ValueReader<'_> {
    fn invalid(&self, expected: &str) -> RuleError {
        RuleError::InvalidValue {
            field: self.field.to_string(),
            operator: self.op.to_string(),
            expected: expected.to_string(),
            actual: match self.value {
                Value::String(_) | Value::Number(_) => self.value.to_string(),
                other => type_name(other).to_string(),
            },
        }
    }

    fn boolean(&self) -> bool {
        coerce_bool(self.value)
    }

    fn string(&self) -> Result<String> {
        match self.value.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(self.invalid("non-empty string")),
        }
    }

    fn string_list(&self) -> Result<Vec<String>> {
        let expected = "non-empty array of strings";
        let arr = self.value.as_array().ok_or_else(|| self.invalid(expected))?;
        if arr.is_empty() {
            return Err(self.invalid(expected));
        }
        arr.iter()
            .map(|item| match item.as_str().map(str::trim) {
                Some(s) if !s.is_empty() => Ok(s.to_string()),
                _ => Err(self.invalid(expected)),
            })
            .collect()
    }

    fn count_of(&self, value: &Value) -> Option<u32> {
        let n = match value {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        if n.fract() != 0.0 || n < 0.0 || n > f64::from(u32::MAX) {
            return None;
        }
        Some(n as u32)
    }

    fn count(&self) -> Result<u32> {
        self.count_of(self.value)
            .ok_or_else(|| self.invalid("non-negative integer"))
    }

    fn range(&self) -> Result<(u32, u32)> {
        let expected = "[min, max] with min <= max";
        match self.value.as_array().map(Vec::as_slice) {
            Some([lo, hi]) => match (self.count_of(lo), self.count_of(hi)) {
                (Some(min), Some(max)) if min <= max => Ok((min, max)),
                _ => Err(self.invalid(expected)),
            },
            _ => Err(self.invalid(expected)),
        }
    }

    fn datetime(&self) -> Result<DateTime<Utc>> {
        self.value
            .as_str()
            .and_then(|s| parse_datetime(s.trim()))
            .ok_or_else(|| self.invalid("ISO-8601 date or datetime"))
    }

    fn platform(&self) -> Result<Platform> {
        self.value
            .as_str()
            .and_then(Platform::parse)
            .ok_or_else(|| self.invalid("ios | android | web"))
    }
}
