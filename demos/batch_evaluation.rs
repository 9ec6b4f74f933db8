use infixa_rs::ast::Evaluator;
use infixa_rs::functions::float_registry;
use std::collections::HashMap;

fn main() {
    pretty_env_logger::init();

    let contexts = vec![
        HashMap::from([
            ("price".to_string(), 120.0),
            ("volume".to_string(), 3000.0),
        ]),
        HashMap::from([
            ("price".to_string(), 80.0),
            ("volume".to_string(), 6000.0),
        ]),
        HashMap::from([("price".to_string(), 95.5)]),
    ];

    let expression = "price * volume / 1e3 + sqrt(volume)";

    let mut registry = float_registry().unwrap();
    registry.register_variable("price").unwrap();
    registry.register_variable("volume").unwrap();

    let mut evaluator = Evaluator::new(registry, 100);
    let results = evaluator.evaluate_batch(expression, &contexts).unwrap();
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(value) => println!("Result {}: {}", i, value),
            Err(err) => println!("Result {}: error: {}", i, err),
        }
    }
}
