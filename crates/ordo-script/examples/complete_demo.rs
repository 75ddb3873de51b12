use ordo_config::LoggingConfig;
use ordo_rule::{Function, Params, RuleDefinition, RuleEngine, RuleStatus};
use ordo_script::RhaiEvaluator;
use serde_json::json;

fn main() -> anyhow::Result<()> {
    // 初始化日志
    ordo_logging::init_logging(&LoggingConfig::default())?;

    println!("ORDO - 规则编排演示\n");

    let mut engine = RuleEngine::new(RhaiEvaluator::new());

    println!("{}", "=".repeat(60));
    println!("示例 1: 文本规则与优先级");
    println!("{}", "=".repeat(60));

    let added = engine.add_rule_from_string(
        r#"
rule "vip_customer"
priority 1
when
    customer_tier = "gold"
then
    set_variable("vip", true);
    exclude("checkout");
end

rule "standard_shipping"
priority 10
when
    event = "checkout"
then
    set_variable("shipping", 5)
end
"#,
    )?;
    println!("已添加 {} 条规则", added);

    println!("{}", "=".repeat(60));
    println!("示例 2: 程序化规则与扩展函数");
    println!("{}", "=".repeat(60));

    engine.register_function(Function::new("loyalty_points", 1, |args| {
        let total = args[0].as_f64().unwrap_or_default();
        Ok(json!((total / 10.0).floor() as i64))
    }))?;

    engine.add_rule(
        RuleDefinition::new(
            "points",
            vec!["total > 0"],
            vec![
                r#"set_variable("points", loyalty_points(total))"#,
                r#"set_variable("checked", true)"#,
            ],
        )
        .with_priority(20),
    );

    engine.add_rule(
        RuleDefinition::new("broken", "true", r#"throw "misconfigured rule""#).with_priority(15),
    );

    for rule in engine.rules() {
        println!("  [{:>4}] {}", rule.priority, rule.name());
    }

    println!("{}", "=".repeat(60));
    println!("示例 3: 执行");
    println!("{}", "=".repeat(60));

    for tier in ["gold", "silver"] {
        let params: Params = serde_json::from_value(json!({
            "event": "checkout",
            "customer_tier": tier,
            "total": 240.0,
        }))?;

        let report = engine.process_with(&params, None);
        println!("客户等级 {}:", tier);
        for outcome in &report.outcomes {
            let status = match &outcome.status {
                RuleStatus::Failed(e) => format!("failed ({})", e),
                other => format!("{:?}", other),
            };
            println!("  {:<20} {}", outcome.rule, status);
        }
        println!("  变量: {}\n", serde_json::to_string(&report.variables)?);
    }

    Ok(())
}
