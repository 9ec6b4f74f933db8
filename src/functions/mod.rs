pub mod arithmetic;
pub mod other;
pub mod trigonometry;

use crate::ast::Registry;
use crate::error::Result;

/// Registers the whole floating-point vocabulary on `registry`.
pub fn register_functions(registry: &mut Registry<f64>) -> Result<()> {
    arithmetic::register(registry)?;
    trigonometry::register(registry)?;
    other::register(registry)?;
    Ok(())
}

/// A registry reading `f64` literals, with [`register_functions`] applied.
pub fn float_registry() -> Result<Registry<f64>> {
    let mut registry = Registry::new(|text: &str| text.parse::<f64>().map_err(|e| e.to_string()));
    register_functions(&mut registry)?;
    Ok(registry)
}
