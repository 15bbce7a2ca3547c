//! 规则引擎集成测试
//!
//! 测试完整的规则加载、编译、解析工作流。

use rule_engine::{
    CompiledCondition, Condition, ConditionEvaluator, LogicalOperator, Operator, PropertyType,
    RequestContext, Resolution, Rule, RuleSetResolver, RuleSnapshot, RuleStore,
};
use serde_json::{Value, json};

/// 管理后台示例数据中的四条规则
fn console_rules_json() -> &'static str {
    r#"
    [
        {
            "id": "1",
            "name": "PayPal Standard Processing",
            "logical_operator": "AND",
            "conditions": [
                {"property_path": "order.payment.method", "property_type": "body_json",
                 "operator": "equals", "value": "paypal", "transform": "lowercase"}
            ],
            "integration_code": "paypal_transaction_verify",
            "priority": 100,
            "active": true
        },
        {
            "id": "2",
            "name": "PayPal High-Value Transaction",
            "logical_operator": "AND",
            "conditions": [
                {"property_path": "order.payment.method", "property_type": "body_json",
                 "operator": "equals", "value": "paypal", "transform": "lowercase"},
                {"property_path": "order.total", "property_type": "body_json",
                 "operator": "greater_than", "value": 1000}
            ],
            "integration_code": "paypal_enhanced_verify",
            "priority": 200,
            "active": true
        },
        {
            "id": "3",
            "name": "Stripe Processing",
            "logical_operator": "AND",
            "conditions": [
                {"property_path": "order.payment.method", "property_type": "body_json",
                 "operator": "equals", "value": "stripe"}
            ],
            "integration_code": "stripe_payment_check",
            "priority": 100,
            "active": true
        },
        {
            "id": "4",
            "name": "European Payment Processing",
            "logical_operator": "AND",
            "conditions": [
                {"property_path": "customer.region", "property_type": "body_json",
                 "operator": "in", "value": ["EU", "UK", "EFTA"]},
                {"property_path": "order.currency", "property_type": "body_json",
                 "operator": "in", "value": ["EUR", "GBP", "CHF"]}
            ],
            "integration_code": "european_payment_processor",
            "priority": 120,
            "active": false
        }
    ]
    "#
}

fn console_snapshot() -> RuleSnapshot {
    let rules: Vec<Rule> = serde_json::from_str(console_rules_json()).unwrap();
    let (snapshot, report) = RuleSnapshot::from_rules(rules);
    assert!(report.is_complete());
    snapshot
}

fn resolve(snapshot: &RuleSnapshot, body: Value) -> Resolution {
    RuleSetResolver::new().resolve(snapshot, &RequestContext::from_json(&body))
}

fn eval_one(condition_json: &str, body: Value) -> bool {
    let condition: Condition = serde_json::from_str(condition_json).unwrap();
    let compiled = CompiledCondition::compile(condition);
    ConditionEvaluator::evaluate(&compiled, &RequestContext::from_json(&body))
}

// ==================== 控制台示例规则场景 ====================

#[test]
fn test_high_value_paypal_routes_to_enhanced_verify() {
    let snapshot = console_snapshot();
    let resolution = resolve(
        &snapshot,
        json!({"order": {"payment": {"method": "PayPal"}, "total": 2500}}),
    );

    let route = resolution.route().unwrap();
    assert_eq!(route.rule_id, "2");
    assert_eq!(route.integration_code, "paypal_enhanced_verify");
}

#[test]
fn test_low_value_paypal_routes_to_standard_verify() {
    let snapshot = console_snapshot();
    let resolution = resolve(
        &snapshot,
        json!({"order": {"payment": {"method": "paypal"}, "total": 20}}),
    );
    assert_eq!(resolution.integration_code(), Some("paypal_transaction_verify"));
}

#[test]
fn test_inactive_european_rule_never_matches() {
    let snapshot = console_snapshot();
    let resolution = resolve(
        &snapshot,
        json!({"customer": {"region": "EU"}, "order": {"currency": "EUR"}}),
    );
    assert_eq!(resolution, Resolution::NoMatch);
}

#[test]
fn test_unknown_payment_method_is_no_match() {
    let snapshot = console_snapshot();
    let resolution = resolve(&snapshot, json!({"order": {"payment": {"method": "cash"}}}));
    assert!(!resolution.is_match());
}

// ==================== 条件场景 ====================

const PAYPAL_LOWERCASE: &str = r#"{
    "propertyPath": "order.payment.method",
    "propertyType": "body_json",
    "operator": "equals",
    "value": "paypal",
    "transform": "lowercase"
}"#;

#[test]
fn test_lowercase_transform_scenario() {
    assert!(eval_one(
        PAYPAL_LOWERCASE,
        json!({"order": {"payment": {"method": "PayPal"}}})
    ));
}

#[test]
fn test_missing_path_scenario() {
    assert!(!eval_one(PAYPAL_LOWERCASE, json!({"order": {}})));
}

#[test]
fn test_in_with_string_set_scenario() {
    let cond = r#"{
        "operator": "in",
        "value": "[\"EU\",\"UK\"]",
        "propertyPath": "customer.region",
        "propertyType": "body_json"
    }"#;
    assert!(eval_one(cond, json!({"customer": {"region": "UK"}})));
    assert!(!eval_one(cond, json!({"customer": {"region": "US"}})));
}

#[test]
fn test_exists_is_false_only_when_absent_for_every_source() {
    let present = RequestContext::builder()
        .path("/orders/42")
        .path_param("id", "42")
        .header("X-Sig", "s")
        .query_param("q", "1")
        .json_body(&json!({"a": {"b": 0}}))
        .build();
    let empty = RequestContext::builder().path("/orders/42").build();

    let cases = [
        (PropertyType::BodyJson, "a.b"),
        (PropertyType::BodyText, ""),
        (PropertyType::Header, "x-sig"),
        (PropertyType::UrlParameter, "q"),
        (PropertyType::Path, "id"),
    ];

    for (property_type, path) in cases {
        let compiled = CompiledCondition::compile(Condition::exists(property_type, path));
        assert_eq!(
            ConditionEvaluator::evaluate(&compiled, &present),
            present.extract(property_type, path).is_some(),
            "{:?}",
            property_type
        );
        assert!(ConditionEvaluator::evaluate(&compiled, &present), "{:?}", property_type);
        assert!(!ConditionEvaluator::evaluate(&compiled, &empty), "{:?}", property_type);
    }
}

// ==================== 组合与优先级 ====================

fn rule_with(id: &str, priority: i32, operator: LogicalOperator, conditions: Vec<Condition>) -> Rule {
    Rule::new(format!("rule {}", id), format!("target_{}", id), conditions)
        .with_id(id)
        .with_priority(priority)
        .with_logical_operator(operator)
}

fn truthy() -> Condition {
    Condition::body_json("flag", Operator::Equals, true)
}

fn falsy() -> Condition {
    Condition::body_json("flag", Operator::Equals, false)
}

#[test]
fn test_and_flips_when_any_condition_flips() {
    let body = json!({"flag": true});
    for flipped in 0..3 {
        let conditions = (0..3)
            .map(|i| if i == flipped { falsy() } else { truthy() })
            .collect();
        let (snapshot, _) =
            RuleSnapshot::from_rules(vec![rule_with("and", 100, LogicalOperator::And, conditions)]);
        assert!(!resolve(&snapshot, body.clone()).is_match());
    }

    let (snapshot, _) = RuleSnapshot::from_rules(vec![rule_with(
        "and",
        100,
        LogicalOperator::And,
        vec![truthy(), truthy(), truthy()],
    )]);
    assert!(resolve(&snapshot, body).is_match());
}

#[test]
fn test_or_with_all_false_never_matches() {
    let body = json!({"flag": true});
    let (snapshot, _) = RuleSnapshot::from_rules(vec![rule_with(
        "or",
        100,
        LogicalOperator::Or,
        vec![falsy(), falsy()],
    )]);
    assert!(!resolve(&snapshot, body.clone()).is_match());

    let (snapshot, _) = RuleSnapshot::from_rules(vec![rule_with(
        "or",
        100,
        LogicalOperator::Or,
        vec![falsy(), truthy()],
    )]);
    assert!(resolve(&snapshot, body).is_match());
}

#[test]
fn test_higher_priority_rule_selected() {
    let (snapshot, _) = RuleSnapshot::from_rules(vec![
        rule_with("r2", 100, LogicalOperator::And, vec![truthy()]),
        rule_with("r1", 200, LogicalOperator::And, vec![truthy()]),
    ]);
    let resolution = resolve(&snapshot, json!({"flag": true}));
    assert_eq!(resolution.route().unwrap().rule_id, "r1");
}

#[test]
fn test_equal_priority_keeps_original_order() {
    let (snapshot, _) = RuleSnapshot::from_rules(vec![
        rule_with("r1", 100, LogicalOperator::And, vec![truthy()]),
        rule_with("r2", 100, LogicalOperator::And, vec![truthy()]),
    ]);
    let resolution = resolve(&snapshot, json!({"flag": true}));
    assert_eq!(resolution.route().unwrap().rule_id, "r1");
}

#[test]
fn test_resolution_is_idempotent() {
    let snapshot = console_snapshot();
    let ctx = RequestContext::from_json(&json!({"order": {"payment": {"method": "PayPal"}, "total": 5000}}));
    let resolver = RuleSetResolver::new();

    let first = resolver.resolve(&snapshot, &ctx);
    let second = resolver.resolve(&snapshot, &ctx);
    assert_eq!(first, second);
}

// ==================== 存储 ====================

#[test]
fn test_store_refresh_workflow() {
    let store = RuleStore::new();
    let rules: Vec<Rule> = serde_json::from_str(console_rules_json()).unwrap();
    let report = store.replace_all(rules);
    assert_eq!(report.loaded.len(), 4);

    // 优先级 200 > 120 > 100 = 100
    assert_eq!(store.list_ids(), vec!["2", "4", "1", "3"]);

    let before = store.snapshot();
    store.delete("2").unwrap();
    let after = store.snapshot();

    let body = json!({"order": {"payment": {"method": "paypal"}, "total": 5000}});
    assert_eq!(resolve(&before, body.clone()).integration_code(), Some("paypal_enhanced_verify"));
    assert_eq!(resolve(&after, body).integration_code(), Some("paypal_transaction_verify"));
}

#[test]
fn test_invalid_rule_is_skipped_on_refresh() {
    let store = RuleStore::new();
    let mut rules: Vec<Rule> = serde_json::from_str(console_rules_json()).unwrap();
    rules[2].conditions.clear();

    let report = store.replace_all(rules);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "3");
    assert!(!store.contains("3"));
}
