use std::fmt;
use std::sync::Arc;

mod evaluator;
mod expression;
mod lexer;
mod parser;
mod registry;

pub use evaluator::Evaluator;
pub use expression::{Bindings, Expression};
pub use lexer::{Lexeme, LexemeKind, Tokenizer};
pub use parser::Parser;
pub use registry::{NumberParser, Position, Registry};

/// Domain computation attached to an operator or function. Receives the
/// evaluated operands in left-to-right order.
pub type Compute<T> = Arc<dyn Fn(&[T]) -> Result<T, String> + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Prefix,
    Suffix,
    /// Binary, left associative.
    Infix,
    /// Binary, right associative.
    InfixRtl,
}

impl OperatorKind {
    pub fn arity(self) -> usize {
        match self {
            OperatorKind::Prefix | OperatorKind::Suffix => 1,
            OperatorKind::Infix | OperatorKind::InfixRtl => 2,
        }
    }

    pub fn is_right_associative(self) -> bool {
        matches!(self, OperatorKind::InfixRtl)
    }
}

/// Number of arguments a function accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Parameters {
    Fixed(usize),
    Unlimited,
}

impl Parameters {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Parameters::Fixed(expected) => expected == count,
            Parameters::Unlimited => true,
        }
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameters::Fixed(count) => write!(f, "{}", count),
            Parameters::Unlimited => write!(f, "any number of"),
        }
    }
}

/// A registered operator: label, kind, precedence and behaviour in one record.
pub struct Operator<T> {
    label: String,
    kind: OperatorKind,
    precedence: i32,
    compute: Compute<T>,
}

impl<T> Operator<T> {
    pub fn new<F>(label: &str, kind: OperatorKind, precedence: i32, compute: F) -> Self
    where
        F: Fn(&[T]) -> Result<T, String> + Send + Sync + 'static,
    {
        Self {
            label: label.to_string(),
            kind,
            precedence,
            compute: Arc::new(compute),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    pub fn precedence(&self) -> i32 {
        self.precedence
    }

    pub fn apply(&self, operands: &[T]) -> Result<T, String> {
        (self.compute)(operands)
    }

    /// Whether this operator, sitting on the operator stack, must be reduced
    /// before `incoming` is pushed.
    pub fn binds_before(&self, incoming: &Operator<T>) -> bool {
        self.precedence > incoming.precedence
            || (self.precedence == incoming.precedence && !incoming.kind.is_right_associative())
    }
}

impl<T> fmt::Debug for Operator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("precedence", &self.precedence)
            .finish_non_exhaustive()
    }
}

/// A registered function with call syntax `label(a, b, ...)`.
pub struct Function<T> {
    label: String,
    parameters: Parameters,
    compute: Compute<T>,
}

impl<T> Function<T> {
    pub fn new<F>(label: &str, parameters: Parameters, compute: F) -> Self
    where
        F: Fn(&[T]) -> Result<T, String> + Send + Sync + 'static,
    {
        Self {
            label: label.to_string(),
            parameters,
            compute: Arc::new(compute),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parameters(&self) -> Parameters {
        self.parameters
    }

    pub fn apply(&self, arguments: &[T]) -> Result<T, String> {
        (self.compute)(arguments)
    }
}

impl<T> fmt::Debug for Function<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("label", &self.label)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum Token<T> {
    Operand(T),
    Operator(Arc<Operator<T>>),
    Function(Arc<Function<T>>),
    /// Resolved from the bindings at evaluation time. Constants are
    /// represented this way too.
    Variable(String),
}

impl<T> Token<T> {
    /// Child count a node holding this token must have, `None` when any count
    /// is acceptable.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Token::Operand(_) | Token::Variable(_) => Some(0),
            Token::Operator(operator) => Some(operator.kind().arity()),
            Token::Function(function) => match function.parameters() {
                Parameters::Fixed(count) => Some(count),
                Parameters::Unlimited => None,
            },
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Token::Operand(_) => None,
            Token::Operator(operator) => Some(operator.label()),
            Token::Function(function) => Some(function.label()),
            Token::Variable(label) => Some(label.as_str()),
        }
    }
}

impl<T: Clone> Clone for Token<T> {
    fn clone(&self) -> Self {
        match self {
            Token::Operand(value) => Token::Operand(value.clone()),
            Token::Operator(operator) => Token::Operator(Arc::clone(operator)),
            Token::Function(function) => Token::Function(Arc::clone(function)),
            Token::Variable(label) => Token::Variable(label.clone()),
        }
    }
}

/// A node of the expression tree. Children are owned exclusively and kept in
/// operand order.
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub token: Token<T>,
    pub children: Vec<Node<T>>,
}

impl<T> Node<T> {
    pub fn leaf(token: Token<T>) -> Self {
        Self {
            token,
            children: Vec::new(),
        }
    }

    pub fn operand(value: T) -> Self {
        Self::leaf(Token::Operand(value))
    }

    pub fn variable(label: &str) -> Self {
        Self::leaf(Token::Variable(label.to_string()))
    }

    pub fn operator(operator: Arc<Operator<T>>, children: Vec<Node<T>>) -> Self {
        Self {
            token: Token::Operator(operator),
            children,
        }
    }

    pub fn function(function: Arc<Function<T>>, children: Vec<Node<T>>) -> Self {
        Self {
            token: Token::Function(function),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Appends the labels of every Variable leaf below this node, depth first.
    pub(crate) fn collect_variables<'a>(&'a self, labels: &mut Vec<&'a str>) {
        if let Token::Variable(label) = &self.token {
            labels.push(label.as_str());
        }
        for child in &self.children {
            child.collect_variables(labels);
        }
    }
}

fn is_word(label: &str) -> bool {
    label
        .chars()
        .last()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

/// Renders the tree fully parenthesised, e.g. `(2 ^ (3 ^ 2))`.
impl<T: fmt::Display> fmt::Display for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Token::Operand(value) => write!(f, "{}", value),
            Token::Variable(label) => write!(f, "{}", label),
            Token::Operator(operator) => match (operator.kind(), self.children.as_slice()) {
                (OperatorKind::Prefix, [operand]) if is_word(operator.label()) => {
                    write!(f, "({} {})", operator.label(), operand)
                }
                (OperatorKind::Prefix, [operand]) => write!(f, "({}{})", operator.label(), operand),
                (OperatorKind::Suffix, [operand]) => write!(f, "({}{})", operand, operator.label()),
                (OperatorKind::Infix | OperatorKind::InfixRtl, [left, right]) => {
                    write!(f, "({} {} {})", left, operator.label(), right)
                }
                _ => write_call(f, operator.label(), &self.children),
            },
            Token::Function(function) => write_call(f, function.label(), &self.children),
        }
    }
}

fn write_call<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    children: &[Node<T>],
) -> fmt::Result {
    write!(f, "{}(", label)?;
    for (index, child) in children.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add() -> Arc<Operator<i64>> {
        Arc::new(Operator::new("+", OperatorKind::Infix, 1, |args: &[i64]| {
            Ok(args[0] + args[1])
        }))
    }

    #[test]
    fn test_operator_kind_arity() {
        assert_eq!(OperatorKind::Prefix.arity(), 1);
        assert_eq!(OperatorKind::Suffix.arity(), 1);
        assert_eq!(OperatorKind::Infix.arity(), 2);
        assert_eq!(OperatorKind::InfixRtl.arity(), 2);
        assert!(OperatorKind::InfixRtl.is_right_associative());
        assert!(!OperatorKind::Infix.is_right_associative());
    }

    #[test]
    fn test_binds_before_respects_associativity() {
        let minus = Operator::new("-", OperatorKind::Infix, 1, |args: &[i64]| Ok(args[0] - args[1]));
        let pow = Operator::new("^", OperatorKind::InfixRtl, 3, |args: &[i64]| {
            Ok(args[0].pow(args[1] as u32))
        });
        let times = Operator::new("*", OperatorKind::Infix, 2, |args: &[i64]| Ok(args[0] * args[1]));

        assert!(minus.binds_before(&minus));
        assert!(!pow.binds_before(&pow));
        assert!(times.binds_before(&minus));
        assert!(!minus.binds_before(&times));
    }

    #[test]
    fn test_token_arity() {
        let unlimited = Arc::new(Function::new("sum", Parameters::Unlimited, |args: &[i64]| {
            Ok(args.iter().sum())
        }));
        let fixed = Arc::new(Function::new("id", Parameters::Fixed(1), |args: &[i64]| Ok(args[0])));

        assert_eq!(Token::Operand(1).arity(), Some(0));
        assert_eq!(Token::<i64>::Variable("x".to_string()).arity(), Some(0));
        assert_eq!(Token::Operator(add()).arity(), Some(2));
        assert_eq!(Token::Function(fixed).arity(), Some(1));
        assert_eq!(Token::Function(unlimited).arity(), None);
    }

    #[test]
    fn test_display_is_fully_parenthesised() {
        let negate = Arc::new(Operator::new("-", OperatorKind::Prefix, 3, |args: &[i64]| Ok(-args[0])));
        let node = Node::operator(
            add(),
            vec![
                Node::operator(negate, vec![Node::operand(2)]),
                Node::variable("x"),
            ],
        );
        assert_eq!(node.to_string(), "((-2) + x)");
    }

    #[test]
    fn test_collect_variables_depth_first() {
        let node = Node::operator(add(), vec![Node::variable("x"), Node::variable("y")]);
        let mut labels = Vec::new();
        node.collect_variables(&mut labels);
        assert_eq!(labels, vec!["x", "y"]);
    }
}
