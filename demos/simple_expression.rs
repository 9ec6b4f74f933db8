use infixa_rs::ast::Evaluator;
use infixa_rs::functions::float_registry;
use std::collections::HashMap;

fn main() {
    pretty_env_logger::init();

    let mut registry = float_registry().expect("Failed to configure registry");
    registry.register_variable("x").expect("Failed to declare x");
    let mut evaluator = Evaluator::new(registry, 100);

    let context = HashMap::from([("x".to_string(), 0.5)]);
    for expression in [
        "5+3/cos(sin(-6))^0.25",
        "deg(asin(sin(rad(30))))",
        "log(2, (ln(2 + 3) * 4))",
        "2(3+4) - 4!",
        "2x^2 + max(x, 1, -3)",
        "unknownFn(1)",
    ] {
        match evaluator.evaluate_expression(expression, &context) {
            Ok(result) => println!("{} = {}", expression, result),
            Err(err) => println!("{}: {}", expression, err),
        }
    }
}
