use infixa_rs::ast::{Bindings, Node, Operator, OperatorKind};
use infixa_rs::functions::float_registry;
use std::collections::HashMap;
use std::sync::Arc;

fn main() {
    pretty_env_logger::init();

    let mut registry = float_registry().expect("Failed to configure registry");
    registry.register_variable("price").unwrap();
    registry.register_variable("volume").unwrap();

    let expression = registry
        .parse("price * 1.1 - volume / 100")
        .expect("Failed to parse");
    println!("Parsed: {}", expression);
    println!("Variables: {:?}", expression.variables());

    let context: HashMap<String, f64> =
        HashMap::from([("price".to_string(), 120.0), ("volume".to_string(), 3000.0)]);
    match expression.evaluate_with(&context) {
        Ok(result) => println!("Result: {}", result),
        Err(err) => println!("Error: {}", err),
    }

    // Trees can also be assembled by hand and evaluated directly.
    let hypot = Arc::new(Operator::new(
        "hypot",
        OperatorKind::Infix,
        2,
        |args: &[f64]| Ok(args[0].hypot(args[1])),
    ));
    let tree = Node::operator(hypot, vec![Node::operand(3.0), Node::variable("price")]);
    let bindings = Bindings::new(&context, registry.constants());
    println!("{} = {:?}", tree, tree.evaluate(&bindings));
}
