use crate::ast::{OperatorKind, Parameters, Registry};
use crate::error::Result;
use crate::functions::trigonometry::UNARY_FUNCTION;

pub fn register(registry: &mut Registry<f64>) -> Result<()> {
    let operators: [(&str, fn(f64) -> f64); 7] = [
        ("round", round),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("ln", f64::ln),
        ("log10", f64::log10),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
    ];
    for (label, function) in operators {
        registry.register_operator(label, OperatorKind::Prefix, UNARY_FUNCTION, move |args| {
            Ok(function(args[0]))
        })?;
    }

    registry.register_function("log", Parameters::Fixed(2), log)?;
    registry.register_function("max", Parameters::Unlimited, max)?;
    registry.register_function("min", Parameters::Unlimited, min)?;
    registry.register_function("mean", Parameters::Unlimited, mean)?;
    registry.register_function("rand", Parameters::Fixed(0), |_| Ok(rand::random::<f64>()))?;

    registry.register_constant("pi", std::f64::consts::PI)?;
    registry.register_constant("e", std::f64::consts::E)?;
    Ok(())
}

/// Halves round up, so `round(-2.5)` is `-2`.
fn round(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// `log(x, base)`
fn log(args: &[f64]) -> Result<f64, String> {
    Ok(args[0].ln() / args[1].ln())
}

fn max(args: &[f64]) -> Result<f64, String> {
    Ok(args.iter().copied().reduce(f64::max).unwrap_or(0.0))
}

fn min(args: &[f64]) -> Result<f64, String> {
    Ok(args.iter().copied().reduce(f64::min).unwrap_or(0.0))
}

fn mean(args: &[f64]) -> Result<f64, String> {
    if args.is_empty() {
        return Ok(0.0);
    }
    Ok(args.iter().sum::<f64>() / args.len() as f64)
}
