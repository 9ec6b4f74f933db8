use crate::ast::{Expression, Function, Operator, OperatorKind, Parameters, Parser};
use crate::error::{ExpressionError, Result};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Turns the text of a numeric literal into a domain value.
pub type NumberParser<T> = Arc<dyn Fn(&str) -> Result<T, String> + Send + Sync>;

/// Label used for the synthesized implicit multiplication operator.
pub const IMPLICIT_MULTIPLICATION: &str = "*";

/// Syntactic position an operator label is found in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Position {
    /// Start of input, or right after an operator, an opening parenthesis or a comma.
    ExpectOperand,
    /// Right after something that produced an operand.
    AfterOperand,
}

/// Label to definition table consulted by the tokenizer and the parser.
///
/// A registry is configured once and then only read; parsing never mutates it.
pub struct Registry<T> {
    operators: HashMap<String, Vec<Arc<Operator<T>>>>,
    functions: HashMap<String, Arc<Function<T>>>,
    constants: HashMap<String, T>,
    variables: HashSet<String>,
    implicit_multiplication: Option<Arc<Operator<T>>>,
    number_parser: NumberParser<T>,
    /// Every known label, longest first.
    labels: Vec<String>,
}

impl<T> Registry<T> {
    pub fn new<F>(number_parser: F) -> Self
    where
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        Self {
            operators: HashMap::new(),
            functions: HashMap::new(),
            constants: HashMap::new(),
            variables: HashSet::new(),
            implicit_multiplication: None,
            number_parser: Arc::new(number_parser),
            labels: Vec::new(),
        }
    }

    /// Registers an operator. A label may carry several operators as long as
    /// their kinds differ (e.g. infix and prefix `-`).
    pub fn register_operator<F>(
        &mut self,
        label: &str,
        kind: OperatorKind,
        precedence: i32,
        compute: F,
    ) -> Result<()>
    where
        F: Fn(&[T]) -> Result<T, String> + Send + Sync + 'static,
    {
        validate_label(label)?;
        if self.functions.contains_key(label)
            || self.constants.contains_key(label)
            || self.variables.contains(label)
        {
            return Err(conflict(label, "operator"));
        }

        let entries = self.operators.entry(label.to_string()).or_default();
        if entries.iter().any(|operator| operator.kind() == kind) {
            return Err(ExpressionError::Configuration(format!(
                "operator `{}` is already registered as {:?}",
                label, kind
            )));
        }
        entries.push(Arc::new(Operator::new(label, kind, precedence, compute)));

        debug!("Registered operator `{}` ({:?}, precedence {})", label, kind, precedence);
        self.remember_label(label);
        Ok(())
    }

    pub fn register_function<F>(
        &mut self,
        label: &str,
        parameters: Parameters,
        compute: F,
    ) -> Result<()>
    where
        F: Fn(&[T]) -> Result<T, String> + Send + Sync + 'static,
    {
        validate_label(label)?;
        if self.functions.contains_key(label) {
            return Err(ExpressionError::Configuration(format!(
                "function `{}` is already registered",
                label
            )));
        }
        if self.operators.contains_key(label)
            || self.constants.contains_key(label)
            || self.variables.contains(label)
        {
            return Err(conflict(label, "function"));
        }

        self.functions.insert(
            label.to_string(),
            Arc::new(Function::new(label, parameters, compute)),
        );

        debug!("Registered function `{}` ({} parameters)", label, parameters);
        self.remember_label(label);
        Ok(())
    }

    pub fn register_constant(&mut self, label: &str, value: T) -> Result<()> {
        validate_label(label)?;
        if self.constants.contains_key(label) {
            return Err(ExpressionError::Configuration(format!(
                "constant `{}` is already registered",
                label
            )));
        }
        if self.operators.contains_key(label)
            || self.functions.contains_key(label)
            || self.variables.contains(label)
        {
            return Err(conflict(label, "constant"));
        }

        self.constants.insert(label.to_string(), value);

        debug!("Registered constant `{}`", label);
        self.remember_label(label);
        Ok(())
    }

    /// Declares a label that is bound only when the expression is evaluated.
    pub fn register_variable(&mut self, label: &str) -> Result<()> {
        validate_label(label)?;
        if self.variables.contains(label) {
            return Err(ExpressionError::Configuration(format!(
                "variable `{}` is already declared",
                label
            )));
        }
        if self.operators.contains_key(label)
            || self.functions.contains_key(label)
            || self.constants.contains_key(label)
        {
            return Err(conflict(label, "variable"));
        }

        self.variables.insert(label.to_string());
        self.remember_label(label);
        Ok(())
    }

    /// Enables implicit multiplication between adjacent operands, e.g. `2(3+4)`
    /// or `2x`. The synthesized operator behaves like a left associative infix
    /// operator with the given precedence.
    pub fn register_implicit_multiplication<F>(&mut self, precedence: i32, compute: F) -> Result<()>
    where
        F: Fn(&[T]) -> Result<T, String> + Send + Sync + 'static,
    {
        if self.implicit_multiplication.is_some() {
            return Err(ExpressionError::Configuration(
                "implicit multiplication is already registered".to_string(),
            ));
        }
        self.implicit_multiplication = Some(Arc::new(Operator::new(
            IMPLICIT_MULTIPLICATION,
            OperatorKind::Infix,
            precedence,
            compute,
        )));
        Ok(())
    }

    /// Picks the operator a label denotes at the given position: the prefix
    /// entry where an operand is expected, otherwise the binary entry or,
    /// failing that, the suffix entry.
    pub fn lookup_operator(&self, label: &str, position: Position) -> Option<&Arc<Operator<T>>> {
        let entries = self.operators.get(label)?;
        let of_kind = move |kind: OperatorKind| entries.iter().find(|operator| operator.kind() == kind);
        match position {
            Position::ExpectOperand => of_kind(OperatorKind::Prefix),
            Position::AfterOperand => of_kind(OperatorKind::Infix)
                .or_else(|| of_kind(OperatorKind::InfixRtl))
                .or_else(|| of_kind(OperatorKind::Suffix)),
        }
    }

    /// Any operator registered under `label`, regardless of position.
    pub(crate) fn any_operator(&self, label: &str) -> Option<&Arc<Operator<T>>> {
        self.operators.get(label).and_then(|entries| entries.first())
    }

    pub fn is_operator(&self, label: &str) -> bool {
        self.operators.contains_key(label)
    }

    pub fn lookup_function(&self, label: &str) -> Option<&Arc<Function<T>>> {
        self.functions.get(label)
    }

    pub fn lookup_constant(&self, label: &str) -> Option<&T> {
        self.constants.get(label)
    }

    pub fn is_variable(&self, label: &str) -> bool {
        self.variables.contains(label)
    }

    pub fn implicit_multiplication(&self) -> Option<&Arc<Operator<T>>> {
        self.implicit_multiplication.as_ref()
    }

    pub fn constants(&self) -> &HashMap<String, T> {
        &self.constants
    }

    pub fn parse_number(&self, literal: &str) -> Result<T, String> {
        (self.number_parser)(literal)
    }

    /// Every registered label, longest first.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn remember_label(&mut self, label: &str) {
        if self.labels.iter().any(|known| known == label) {
            return;
        }
        let at = self.labels.partition_point(|known| known.len() >= label.len());
        self.labels.insert(at, label.to_string());
    }
}

impl<T: Clone> Registry<T> {
    /// Parses `input` into an expression that snapshots the current constants.
    pub fn parse(&self, input: &str) -> Result<Expression<T>> {
        Parser::new(self).parse_expression(input)
    }
}

fn conflict(label: &str, category: &str) -> ExpressionError {
    ExpressionError::Configuration(format!(
        "cannot register {} `{}`: the label is already in use",
        category, label
    ))
}

fn validate_label(label: &str) -> Result<()> {
    let Some(first) = label.chars().next() else {
        return Err(ExpressionError::Configuration(
            "labels must not be empty".to_string(),
        ));
    };
    if first.is_ascii_digit() {
        return Err(ExpressionError::Configuration(format!(
            "label `{}` must not start with a digit",
            label
        )));
    }
    if label
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | ','))
    {
        return Err(ExpressionError::Configuration(format!(
            "label `{}` must not contain whitespace, parentheses or commas",
            label
        )));
    }
    Ok(())
}
