pub mod ast;
pub mod error;
pub mod functions;

use ast::{Evaluator, Expression};
use error::Result;
use functions::float_registry;
use std::collections::HashMap;

pub use error::ExpressionError;

/// Parses and evaluates `expression` with the floating-point vocabulary from
/// [`functions`]. Every key of `context` is declared as a variable first, so
/// `context` may also shadow a constant such as `pi`.
pub fn evaluate_expression(expression: &str, context: &HashMap<String, f64>) -> Result<f64> {
    let mut registry = float_registry()?;
    for label in context.keys() {
        if registry.lookup_constant(label).is_none() {
            registry.register_variable(label)?;
        }
    }

    let mut evaluator = Evaluator::new(registry, 0);
    evaluator.evaluate_expression(expression, context)
}

/// Parses `expression` once for repeated evaluation, declaring `variables`.
pub fn parse_expression(expression: &str, variables: &[&str]) -> Result<Expression<f64>> {
    let mut registry = float_registry()?;
    for label in variables {
        registry.register_variable(label)?;
    }
    registry.parse(expression)
}
