use crate::ast::{OperatorKind, Registry};
use crate::error::Result;

pub const ADDITIVE: i32 = 1;
pub const MULTIPLICATIVE: i32 = 2;
/// Shared by `^` and the unary signs, so `-2^2` is `-(2^2)` while `2^-1` still parses.
pub const POWER: i32 = 3;
pub const FACTORIAL: i32 = 5;

pub fn register(registry: &mut Registry<f64>) -> Result<()> {
    registry.register_operator("+", OperatorKind::Infix, ADDITIVE, add)?;
    registry.register_operator("-", OperatorKind::Infix, ADDITIVE, subtract)?;
    registry.register_operator("*", OperatorKind::Infix, MULTIPLICATIVE, multiply)?;
    registry.register_operator("/", OperatorKind::Infix, MULTIPLICATIVE, divide)?;
    registry.register_operator("%", OperatorKind::Infix, MULTIPLICATIVE, remainder)?;
    registry.register_operator("^", OperatorKind::InfixRtl, POWER, power)?;
    registry.register_operator("+", OperatorKind::Prefix, POWER, plus)?;
    registry.register_operator("-", OperatorKind::Prefix, POWER, negate)?;
    registry.register_operator("!", OperatorKind::Suffix, FACTORIAL, factorial)?;
    registry.register_implicit_multiplication(MULTIPLICATIVE, multiply)?;
    Ok(())
}

fn add(args: &[f64]) -> Result<f64, String> {
    Ok(args[0] + args[1])
}

fn subtract(args: &[f64]) -> Result<f64, String> {
    Ok(args[0] - args[1])
}

fn multiply(args: &[f64]) -> Result<f64, String> {
    Ok(args[0] * args[1])
}

/// IEEE semantics: dividing by zero yields an infinity or NaN.
fn divide(args: &[f64]) -> Result<f64, String> {
    Ok(args[0] / args[1])
}

fn remainder(args: &[f64]) -> Result<f64, String> {
    Ok(args[0] % args[1])
}

fn power(args: &[f64]) -> Result<f64, String> {
    Ok(args[0].powf(args[1]))
}

fn plus(args: &[f64]) -> Result<f64, String> {
    Ok(args[0])
}

fn negate(args: &[f64]) -> Result<f64, String> {
    Ok(-args[0])
}

fn factorial(args: &[f64]) -> Result<f64, String> {
    let n = args[0];
    if n < 0.0 || n.fract() != 0.0 {
        return Err(format!("Cannot calculate factorial of {}", n));
    }
    // 171! already overflows f64.
    if n > 170.0 {
        return Ok(f64::INFINITY);
    }
    Ok((2..=n as u64).fold(1.0, |product, i| product * i as f64))
}
