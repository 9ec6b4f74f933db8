use crate::ast::{OperatorKind, Parameters, Registry};
use crate::error::Result;

/// Named unary operators bind tighter than `^`, so `cos x^2` is `(cos x)^2`.
pub const UNARY_FUNCTION: i32 = 4;

pub fn register(registry: &mut Registry<f64>) -> Result<()> {
    let operators: [(&str, fn(f64) -> f64); 12] = [
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sinh", f64::sinh),
        ("cosh", f64::cosh),
        ("tanh", f64::tanh),
        ("asinh", f64::asinh),
        ("acosh", f64::acosh),
        ("atanh", f64::atanh),
    ];
    for (label, function) in operators {
        registry.register_operator(label, OperatorKind::Prefix, UNARY_FUNCTION, move |args| {
            Ok(function(args[0]))
        })?;
    }

    registry.register_function("deg", Parameters::Fixed(1), |args| Ok(args[0].to_degrees()))?;
    registry.register_function("rad", Parameters::Fixed(1), |args| Ok(args[0].to_radians()))?;
    Ok(())
}
