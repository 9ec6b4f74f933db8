use crate::ast::{Node, Token};
use crate::error::{ExpressionError, Result};
use log::trace;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Values visible to one evaluation: caller variables first, then the
/// constants captured when the expression was parsed.
pub struct Bindings<'a, T> {
    variables: &'a HashMap<String, T>,
    constants: &'a HashMap<String, T>,
}

impl<'a, T> Bindings<'a, T> {
    pub fn new(variables: &'a HashMap<String, T>, constants: &'a HashMap<String, T>) -> Self {
        Self {
            variables,
            constants,
        }
    }

    pub fn get(&self, label: &str) -> Option<&'a T> {
        self.variables
            .get(label)
            .or_else(|| self.constants.get(label))
    }
}

/// A parsed expression: the tree plus the constants known at parse time.
///
/// Evaluation never mutates the tree, so one expression can be evaluated any
/// number of times, from any number of threads, against different bindings.
#[derive(Debug, Clone)]
pub struct Expression<T> {
    root: Option<Node<T>>,
    constants: HashMap<String, T>,
}

impl<T> Expression<T> {
    pub fn new(root: Node<T>, constants: HashMap<String, T>) -> Self {
        Self {
            root: Some(root),
            constants,
        }
    }

    /// An expression with nothing to evaluate. Evaluating it fails with
    /// `InvalidExpression`.
    pub fn empty(constants: HashMap<String, T>) -> Self {
        Self {
            root: None,
            constants,
        }
    }

    pub fn root(&self) -> Option<&Node<T>> {
        self.root.as_ref()
    }

    /// Read-only view of the constants captured at parse time.
    pub fn constants(&self) -> &HashMap<String, T> {
        &self.constants
    }

    /// Labels of every variable or constant the expression refers to.
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut labels = Vec::new();
        if let Some(root) = &self.root {
            root.collect_variables(&mut labels);
        }
        labels.into_iter().collect()
    }
}

impl<T: Clone> Expression<T> {
    /// Evaluates the expression with no variables bound.
    pub fn evaluate(&self) -> Result<T> {
        self.evaluate_with(&HashMap::new())
    }

    /// Evaluates the expression. A variable with the same label as a constant
    /// takes precedence over it.
    pub fn evaluate_with(&self, variables: &HashMap<String, T>) -> Result<T> {
        let root = self.root.as_ref().ok_or(ExpressionError::InvalidExpression)?;
        let bindings = Bindings::new(variables, &self.constants);
        evaluate(root, &bindings)
    }
}

impl<T: Clone + Send + Sync> Expression<T> {
    /// Evaluates the expression once per context, in parallel. Results keep
    /// the order of `contexts`.
    pub fn evaluate_batch(&self, contexts: &[HashMap<String, T>]) -> Vec<Result<T>> {
        contexts
            .par_iter()
            .map(|context| self.evaluate_with(context))
            .collect()
    }
}

impl<T: fmt::Display> fmt::Display for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{}", root),
            None => write!(f, "<empty>"),
        }
    }
}

impl<T: Clone> Node<T> {
    /// Evaluates the subtree rooted at this node against `bindings`.
    pub fn evaluate(&self, bindings: &Bindings<'_, T>) -> Result<T> {
        evaluate(self, bindings)
    }
}

/// Recursively evaluates `node`, children left to right.
fn evaluate<T: Clone>(node: &Node<T>, bindings: &Bindings<'_, T>) -> Result<T> {
    // Trees can be built by hand, so the shape is checked again here.
    if let Some(expected) = node.token.arity() {
        if node.children.len() != expected {
            return Err(ExpressionError::Arity {
                label: node.token.label().unwrap_or("operand").to_string(),
                expected,
                found: node.children.len(),
                offset: None,
            });
        }
    }

    match &node.token {
        Token::Operand(value) => Ok(value.clone()),
        Token::Variable(label) => bindings
            .get(label)
            .cloned()
            .ok_or_else(|| ExpressionError::UnboundVariable(label.clone())),
        Token::Operator(operator) => {
            let operands = evaluate_children(node, bindings)?;
            trace!("Applying `{}`", operator.label());
            operator
                .apply(&operands)
                .map_err(|message| ExpressionError::Compute {
                    label: operator.label().to_string(),
                    message,
                })
        }
        Token::Function(function) => {
            let arguments = evaluate_children(node, bindings)?;
            trace!("Calling `{}` with {} argument(s)", function.label(), arguments.len());
            function
                .apply(&arguments)
                .map_err(|message| ExpressionError::Compute {
                    label: function.label().to_string(),
                    message,
                })
        }
    }
}

fn evaluate_children<T: Clone>(node: &Node<T>, bindings: &Bindings<'_, T>) -> Result<Vec<T>> {
    node.children
        .iter()
        .map(|child| evaluate(child, bindings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Function, Operator, OperatorKind, Parameters};
    use std::sync::Arc;

    fn add() -> Arc<Operator<i64>> {
        Arc::new(Operator::new("+", OperatorKind::Infix, 1, |args: &[i64]| {
            Ok(args[0] + args[1])
        }))
    }

    fn constants() -> HashMap<String, i64> {
        HashMap::from([("k".to_string(), 100)])
    }

    #[test]
    fn test_evaluate_hand_built_tree() {
        let expression = Expression::new(
            Node::operator(add(), vec![Node::operand(2), Node::variable("k")]),
            constants(),
        );
        assert_eq!(expression.evaluate().unwrap(), 102);
    }

    #[test]
    fn test_variable_overrides_constant() {
        let expression = Expression::new(
            Node::operator(add(), vec![Node::operand(2), Node::variable("k")]),
            constants(),
        );
        let variables = HashMap::from([("k".to_string(), 1)]);
        assert_eq!(expression.evaluate_with(&variables).unwrap(), 3);
        // The snapshot itself is untouched.
        assert_eq!(expression.constants().get("k"), Some(&100));
    }

    #[test]
    fn test_unbound_variable() {
        let expression = Expression::new(Node::variable("x"), constants());
        assert_eq!(
            expression.evaluate(),
            Err(ExpressionError::UnboundVariable("x".to_string()))
        );
    }

    #[test]
    fn test_node_evaluates_against_explicit_bindings() {
        let node = Node::operator(add(), vec![Node::variable("x"), Node::variable("k")]);
        let variables = HashMap::from([("x".to_string(), 5)]);
        let constants = constants();
        let bindings = Bindings::new(&variables, &constants);
        assert_eq!(node.evaluate(&bindings).unwrap(), 105);
    }

    #[test]
    fn test_empty_expression_is_invalid() {
        let expression: Expression<i64> = Expression::empty(constants());
        assert_eq!(expression.evaluate(), Err(ExpressionError::InvalidExpression));
    }

    #[test]
    fn test_mutated_tree_fails_arity_check() {
        let mut root = Node::operator(add(), vec![Node::operand(1), Node::operand(2)]);
        root.children.push(Node::operand(3));
        let expression = Expression::new(root, HashMap::new());
        assert!(matches!(
            expression.evaluate(),
            Err(ExpressionError::Arity {
                expected: 2,
                found: 3,
                offset: None,
                ..
            })
        ));

        let mut leaf = Node::operand(1);
        leaf.children.push(Node::operand(2));
        assert!(matches!(
            Expression::new(leaf, HashMap::new()).evaluate(),
            Err(ExpressionError::Arity { expected: 0, .. })
        ));
    }

    #[test]
    fn test_unlimited_function_takes_any_count() {
        let sum = Arc::new(Function::new("sum", Parameters::Unlimited, |args: &[i64]| {
            Ok(args.iter().sum())
        }));
        let none = Expression::new(Node::function(Arc::clone(&sum), vec![]), HashMap::new());
        assert_eq!(none.evaluate().unwrap(), 0);

        let many = Expression::new(
            Node::function(sum, (1..=5).map(Node::operand).collect()),
            HashMap::new(),
        );
        assert_eq!(many.evaluate().unwrap(), 15);
    }

    #[test]
    fn test_compute_failure_is_reported() {
        let checked_div = Arc::new(Operator::new("/", OperatorKind::Infix, 2, |args: &[i64]| {
            args[0]
                .checked_div(args[1])
                .ok_or_else(|| "Division by zero".to_string())
        }));
        let expression = Expression::new(
            Node::operator(checked_div, vec![Node::operand(1), Node::operand(0)]),
            HashMap::new(),
        );
        assert_eq!(
            expression.evaluate(),
            Err(ExpressionError::Compute {
                label: "/".to_string(),
                message: "Division by zero".to_string(),
            })
        );
    }

    #[test]
    fn test_children_are_evaluated_left_to_right() {
        let minus = Arc::new(Operator::new("-", OperatorKind::Infix, 1, |args: &[i64]| {
            Ok(args[0] - args[1])
        }));
        let expression = Expression::new(
            Node::operator(minus, vec![Node::operand(10), Node::operand(4)]),
            HashMap::new(),
        );
        assert_eq!(expression.evaluate().unwrap(), 6);
    }

    #[test]
    fn test_evaluate_batch_keeps_order() {
        let expression = Expression::new(
            Node::operator(add(), vec![Node::variable("x"), Node::variable("k")]),
            constants(),
        );
        let contexts: Vec<HashMap<String, i64>> = (0..64)
            .map(|i| HashMap::from([("x".to_string(), i)]))
            .chain(std::iter::once(HashMap::new()))
            .collect();

        let results = expression.evaluate_batch(&contexts);
        assert_eq!(results.len(), 65);
        for (i, result) in results.iter().take(64).enumerate() {
            assert_eq!(result, &Ok(i as i64 + 100));
        }
        assert_eq!(
            results[64],
            Err(ExpressionError::UnboundVariable("x".to_string()))
        );
    }

    #[test]
    fn test_variables_lists_leaf_labels() {
        let expression = Expression::new(
            Node::operator(
                add(),
                vec![
                    Node::variable("y"),
                    Node::operator(add(), vec![Node::variable("k"), Node::variable("y")]),
                ],
            ),
            constants(),
        );
        assert_eq!(
            expression.variables().into_iter().collect::<Vec<_>>(),
            vec!["k", "y"]
        );
    }
}
