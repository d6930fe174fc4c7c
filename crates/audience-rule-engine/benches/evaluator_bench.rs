//! 受众规则性能基准测试
//!
//! 覆盖规则编译、单接收人评估以及整批候选集过滤。

use campaign_shared::models::Recipient;
use campaign_shared::test_utils::RecipientBuilder;
use chrono::Utc;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rule_engine::{AudienceRule, AudienceRuleSpec, RuleCompiler};
use serde_json::json;
use std::hint::black_box;

fn create_rule() -> AudienceRule {
    let spec = AudienceRuleSpec::from_value(json!({
        "all": [
            {"field": "is_verified", "op": "=", "value": true},
            {"field": "age", "op": "between", "value": [18, 40]},
            {"field": "profile_complete", "op": "=", "value": "true"}
        ],
        "any": [
            {"field": "country", "op": "in", "value": ["NG", "GH", "KE"]},
            {"field": "interests", "op": "contains_any", "value": ["music", "sports"]}
        ]
    }))
    .expect("valid spec");
    RuleCompiler::new().compile(&spec).expect("valid rule")
}

fn create_recipients(n: usize) -> Vec<Recipient> {
    (0..n)
        .map(|i| {
            let builder = RecipientBuilder::new(format!("u-{i:06}"))
                .verified(i % 2 == 0)
                .birth_date(1980 + (i % 30) as i32, 1, 1);
            if i % 3 == 0 {
                builder.complete_profile().build()
            } else {
                builder.location("Nairobi", "KE").build()
            }
        })
        .collect()
}

/// 规则编译基准
fn bench_compile(c: &mut Criterion) {
    let raw = r#"{"all":[{"field":"is_verified","op":"=","value":true},{"field":"age","op":">=","value":18}],"any":[{"field":"country","op":"in","value":["NG","GH"]}]}"#;
    let compiler = RuleCompiler::new();

    c.bench_function("compile_rule", |b| {
        b.iter(|| compiler.compile_from_json(black_box(raw)))
    });
}

/// 候选集过滤基准
fn bench_filter(c: &mut Criterion) {
    let rule = create_rule();
    let as_of = Utc::now();
    let mut group = c.benchmark_group("filter_candidates");

    for size in [100usize, 1_000, 10_000] {
        let recipients = create_recipients(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &recipients, |b, rs| {
            b.iter(|| {
                rs.iter()
                    .filter(|r| rule.matches(black_box(*r), as_of))
                    .count()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_filter);
criterion_main!(benches);
