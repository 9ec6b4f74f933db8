use crate::ast::{
    Expression, Function, Lexeme, LexemeKind, Node, Operator, OperatorKind, Parameters, Position,
    Registry, Tokenizer,
};
use crate::error::{ExpressionError, Result};
use log::{debug, trace};
use std::iter::Peekable;
use std::sync::Arc;

/// Entry of the operator stack.
#[derive(Debug)]
enum StackEntry<T> {
    Operator {
        operator: Arc<Operator<T>>,
        offset: usize,
    },
    /// A plain grouping parenthesis. `base` is the operand stack height when
    /// the group opened.
    OpenParen { base: usize, offset: usize },
    /// The opening parenthesis of a function call and the number of commas
    /// seen in it so far.
    FunctionCall {
        function: Arc<Function<T>>,
        commas: usize,
        base: usize,
        offset: usize,
    },
}

impl<T> StackEntry<T> {
    fn base(&self) -> Option<usize> {
        match self {
            StackEntry::Operator { .. } => None,
            StackEntry::OpenParen { base, .. } | StackEntry::FunctionCall { base, .. } => Some(*base),
        }
    }
}

/// What the previously processed lexeme left behind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Last {
    Start,
    /// Something that produced an operand: a literal, a constant, a variable,
    /// a closing parenthesis or a suffix operator.
    Operand,
    /// A prefix or binary operator still waiting for its right operand.
    Operator,
    Open,
    Comma,
}

impl Last {
    fn position(self) -> Position {
        match self {
            Last::Operand => Position::AfterOperand,
            Last::Start | Last::Operator | Last::Open | Last::Comma => Position::ExpectOperand,
        }
    }
}

/// Dual-stack shunting-yard parser.
///
/// Operands accumulate as finished subtrees on one stack while operators,
/// grouping parentheses and function calls wait on the other until their
/// precedence or a closing parenthesis allows them to be reduced.
pub struct Parser<'r, T> {
    registry: &'r Registry<T>,
}

impl<'r, T: Clone> Parser<'r, T> {
    pub fn new(registry: &'r Registry<T>) -> Self {
        Self { registry }
    }

    pub fn parse_expression(&self, input: &str) -> Result<Expression<T>> {
        debug!("Parsing expression: {}", input);
        let root = self.parse_tree(input)?;
        Ok(Expression::new(root, self.registry.constants().clone()))
    }

    /// Parses `input` into a bare tree.
    pub fn parse_tree(&self, input: &str) -> Result<Node<T>> {
        let mut state = DualStack::new(self.registry);
        let mut lexemes = Tokenizer::new(input, self.registry).peekable();

        while let Some(lexeme) = lexemes.next() {
            let lexeme = lexeme?;
            match lexeme.kind {
                LexemeKind::Number => {
                    let value = self.registry.parse_number(lexeme.text).map_err(|reason| {
                        ExpressionError::Lex {
                            offset: lexeme.offset,
                            message: format!("invalid number `{}`: {}", lexeme.text, reason),
                        }
                    })?;
                    state.push_operand(Node::operand(value), lexeme.offset)?;
                }
                LexemeKind::Identifier | LexemeKind::Symbol => {
                    self.on_label(&mut state, lexeme, &mut lexemes)?;
                }
                LexemeKind::OpenParen => state.open_group(lexeme.offset)?,
                LexemeKind::CloseParen => state.close_group(lexeme.offset)?,
                LexemeKind::Comma => state.next_argument(lexeme.offset)?,
            }
        }

        let root = state.finish(input.len())?;
        debug!("Parsed expression: {:?}", input);
        Ok(root)
    }

    fn on_label<'a>(
        &self,
        state: &mut DualStack<'r, T>,
        lexeme: Lexeme<'a>,
        lexemes: &mut Peekable<Tokenizer<'a>>,
    ) -> Result<()> {
        let label = lexeme.text;
        let offset = lexeme.offset;

        if self.registry.is_operator(label) {
            return state.on_operator(label, offset);
        }

        if let Some(function) = self.registry.lookup_function(label) {
            let called = matches!(
                lexemes.peek(),
                Some(Ok(Lexeme {
                    kind: LexemeKind::OpenParen,
                    ..
                }))
            );
            if called {
                lexemes.next();
                return state.open_call(Arc::clone(function), offset);
            }
            if function.parameters() == Parameters::Fixed(0) {
                return state.push_operand(Node::function(Arc::clone(function), Vec::new()), offset);
            }
            return Err(ExpressionError::syntax(
                offset,
                format!("function `{}` must be followed by `(`", label),
            ));
        }

        if self.registry.lookup_constant(label).is_some() || self.registry.is_variable(label) {
            return state.push_operand(Node::variable(label), offset);
        }

        Err(ExpressionError::UnknownSymbol {
            symbol: label.to_string(),
            offset,
        })
    }
}

struct DualStack<'r, T> {
    registry: &'r Registry<T>,
    operands: Vec<Node<T>>,
    operators: Vec<StackEntry<T>>,
    last: Last,
}

impl<'r, T> DualStack<'r, T> {
    fn new(registry: &'r Registry<T>) -> Self {
        Self {
            registry,
            operands: Vec::new(),
            operators: Vec::new(),
            last: Last::Start,
        }
    }

    /// Two operand-producing items in a row get an implicit multiplication
    /// between them.
    fn separate_operands(&mut self, offset: usize) -> Result<()> {
        if self.last != Last::Operand {
            return Ok(());
        }
        let registry = self.registry;
        let Some(multiplication) = registry.implicit_multiplication() else {
            return Err(ExpressionError::syntax(offset, "missing operator between operands"));
        };
        trace!("Implicit multiplication at {}", offset);
        self.push_operator(Arc::clone(multiplication), offset)
    }

    fn push_operand(&mut self, node: Node<T>, offset: usize) -> Result<()> {
        self.separate_operands(offset)?;
        self.operands.push(node);
        self.last = Last::Operand;
        Ok(())
    }

    fn on_operator(&mut self, label: &str, offset: usize) -> Result<()> {
        let registry = self.registry;
        let position = self.last.position();
        if let Some(operator) = registry.lookup_operator(label, position) {
            let operator = Arc::clone(operator);
            return match operator.kind() {
                OperatorKind::Prefix => self.push_prefix(operator, offset),
                _ => self.push_operator(operator, offset),
            };
        }

        // Only a prefix form exists but an operand precedes it: `2 sqrt 4`.
        if position == Position::AfterOperand {
            if let Some(prefix) = registry.lookup_operator(label, Position::ExpectOperand) {
                let prefix = Arc::clone(prefix);
                self.separate_operands(offset)?;
                return self.push_prefix(prefix, offset);
            }
        }

        // Binary or suffix operator with its left operand missing. Pushing it
        // anyway lets the reduction report the missing operand.
        match registry.any_operator(label) {
            Some(operator) => {
                let operator = Arc::clone(operator);
                self.push_operator(operator, offset)
            }
            None => Err(ExpressionError::UnknownSymbol {
                symbol: label.to_string(),
                offset,
            }),
        }
    }

    fn push_prefix(&mut self, operator: Arc<Operator<T>>, offset: usize) -> Result<()> {
        self.operators.push(StackEntry::Operator { operator, offset });
        self.last = Last::Operator;
        Ok(())
    }

    /// Reduces everything on the operator stack that binds tighter than
    /// `operator`, then pushes it.
    fn push_operator(&mut self, operator: Arc<Operator<T>>, offset: usize) -> Result<()> {
        while let Some((top, at)) = self.pop_operator_if(|top| top.binds_before(&operator)) {
            self.reduce(top, at)?;
        }
        self.last = match operator.kind() {
            OperatorKind::Suffix => Last::Operand,
            _ => Last::Operator,
        };
        self.operators.push(StackEntry::Operator { operator, offset });
        Ok(())
    }

    fn pop_operator_if<P>(&mut self, predicate: P) -> Option<(Arc<Operator<T>>, usize)>
    where
        P: Fn(&Operator<T>) -> bool,
    {
        match self.operators.last() {
            Some(StackEntry::Operator { operator, .. }) if predicate(&**operator) => {}
            _ => return None,
        }
        match self.operators.pop() {
            Some(StackEntry::Operator { operator, offset }) => Some((operator, offset)),
            _ => None,
        }
    }

    /// Operand stack height below which the innermost open group may not reach.
    fn floor(&self) -> usize {
        self.operators
            .iter()
            .rev()
            .find_map(StackEntry::base)
            .unwrap_or(0)
    }

    /// Pops the operands of `operator` and pushes the resulting subtree.
    fn reduce(&mut self, operator: Arc<Operator<T>>, offset: usize) -> Result<()> {
        let arity = operator.kind().arity();
        let available = self.operands.len() - self.floor();
        if available < arity {
            return Err(ExpressionError::Arity {
                label: operator.label().to_string(),
                expected: arity,
                found: available,
                offset: Some(offset),
            });
        }
        let children = self.operands.split_off(self.operands.len() - arity);
        trace!("Reduced `{}` at {}", operator.label(), offset);
        self.operands.push(Node::operator(operator, children));
        Ok(())
    }

    fn reduce_all_operators(&mut self) -> Result<()> {
        while let Some((operator, offset)) = self.pop_operator_if(|_| true) {
            self.reduce(operator, offset)?;
        }
        Ok(())
    }

    fn open_group(&mut self, offset: usize) -> Result<()> {
        self.separate_operands(offset)?;
        self.operators.push(StackEntry::OpenParen {
            base: self.operands.len(),
            offset,
        });
        self.last = Last::Open;
        Ok(())
    }

    fn open_call(&mut self, function: Arc<Function<T>>, offset: usize) -> Result<()> {
        self.separate_operands(offset)?;
        self.operators.push(StackEntry::FunctionCall {
            function,
            commas: 0,
            base: self.operands.len(),
            offset,
        });
        self.last = Last::Open;
        Ok(())
    }

    fn next_argument(&mut self, offset: usize) -> Result<()> {
        if self.last != Last::Operand {
            return Err(ExpressionError::syntax(offset, "missing argument before `,`"));
        }
        self.reduce_all_operators()?;
        match self.operators.last_mut() {
            Some(StackEntry::FunctionCall { commas, .. }) => *commas += 1,
            _ => return Err(ExpressionError::syntax(offset, "`,` outside of a function call")),
        }
        self.last = Last::Comma;
        Ok(())
    }

    fn close_group(&mut self, offset: usize) -> Result<()> {
        if self.last == Last::Comma {
            return Err(ExpressionError::syntax(offset, "missing argument before `)`"));
        }
        let empty = self.last == Last::Open;
        self.reduce_all_operators()?;

        match self.operators.pop() {
            None => Err(ExpressionError::syntax(offset, "unmatched `)`")),
            Some(StackEntry::OpenParen { base, .. }) => {
                if empty {
                    return Err(ExpressionError::syntax(offset, "empty parentheses"));
                }
                if self.operands.len() != base + 1 {
                    return Err(ExpressionError::syntax(offset, "malformed parenthesised expression"));
                }
                self.last = Last::Operand;
                Ok(())
            }
            Some(StackEntry::FunctionCall {
                function,
                commas,
                base,
                offset: opened,
            }) => {
                let count = if empty { 0 } else { commas + 1 };
                if let Parameters::Fixed(expected) = function.parameters() {
                    if expected != count {
                        return Err(ExpressionError::Arity {
                            label: function.label().to_string(),
                            expected,
                            found: count,
                            offset: Some(opened),
                        });
                    }
                }
                if self.operands.len() != base + count {
                    return Err(ExpressionError::syntax(
                        offset,
                        format!("malformed arguments to `{}`", function.label()),
                    ));
                }
                let arguments = self.operands.split_off(base);
                trace!("Called `{}` with {} argument(s)", function.label(), count);
                self.operands.push(Node::function(function, arguments));
                self.last = Last::Operand;
                Ok(())
            }
            Some(StackEntry::Operator { .. }) => {
                unreachable!("operators are reduced before a group closes")
            }
        }
    }

    fn finish(mut self, end: usize) -> Result<Node<T>> {
        while let Some(entry) = self.operators.pop() {
            match entry {
                StackEntry::Operator { operator, offset } => self.reduce(operator, offset)?,
                StackEntry::OpenParen { offset, .. } | StackEntry::FunctionCall { offset, .. } => {
                    return Err(ExpressionError::syntax(offset, "unmatched `(`"));
                }
            }
        }

        match self.operands.len() {
            0 => Err(ExpressionError::syntax(end, "empty expression")),
            1 => self
                .operands
                .pop()
                .ok_or_else(|| ExpressionError::syntax(end, "empty expression")),
            _ => Err(ExpressionError::syntax(end, "malformed expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Integer configuration small enough to reason about tree shapes.
    fn registry() -> Registry<i64> {
        let mut registry = Registry::new(|text: &str| text.parse::<i64>().map_err(|e| e.to_string()));
        registry
            .register_operator("+", OperatorKind::Infix, 1, |args| Ok(args[0] + args[1]))
            .unwrap();
        registry
            .register_operator("-", OperatorKind::Infix, 1, |args| Ok(args[0] - args[1]))
            .unwrap();
        registry
            .register_operator("-", OperatorKind::Prefix, 3, |args| Ok(-args[0]))
            .unwrap();
        registry
            .register_operator("*", OperatorKind::Infix, 2, |args| Ok(args[0] * args[1]))
            .unwrap();
        registry
            .register_operator("^", OperatorKind::InfixRtl, 3, |args| {
                Ok(args[0].pow(args[1] as u32))
            })
            .unwrap();
        registry
            .register_operator("!", OperatorKind::Suffix, 5, |args| Ok((1..=args[0]).product()))
            .unwrap();
        registry
            .register_operator("abs", OperatorKind::Prefix, 4, |args| Ok(args[0].abs()))
            .unwrap();
        registry
            .register_function("sum", Parameters::Unlimited, |args| Ok(args.iter().sum()))
            .unwrap();
        registry
            .register_function("pair", Parameters::Fixed(2), |args| Ok(args[0] * 10 + args[1]))
            .unwrap();
        registry
            .register_function("seven", Parameters::Fixed(0), |_| Ok(7))
            .unwrap();
        registry.register_constant("k", 100).unwrap();
        registry.register_variable("x").unwrap();
        registry.register_variable("y").unwrap();
        registry
            .register_implicit_multiplication(2, |args| Ok(args[0] * args[1]))
            .unwrap();
        registry
    }

    fn shape(input: &str) -> String {
        Parser::new(&registry()).parse_tree(input).unwrap().to_string()
    }

    fn parse_error(input: &str) -> ExpressionError {
        Parser::new(&registry()).parse_tree(input).unwrap_err()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(shape("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(shape("1 * 2 + 3"), "((1 * 2) + 3)");
    }

    #[test]
    fn test_left_associativity() {
        assert_eq!(shape("8 - 3 - 2"), "((8 - 3) - 2)");
    }

    #[test]
    fn test_right_associativity() {
        assert_eq!(shape("2 ^ 3 ^ 2"), "(2 ^ (3 ^ 2))");
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(shape("(1 + 2) * 3"), "((1 + 2) * 3)");
        assert_eq!(shape("((4))"), "4");
    }

    #[test]
    fn test_unary_minus_by_position() {
        assert_eq!(shape("-2"), "(-2)");
        assert_eq!(shape("1 - -2"), "(1 - (-2))");
        assert_eq!(shape("--2"), "(-(-2))");
        assert_eq!(shape("(-2)"), "(-2)");
        assert_eq!(shape("sum(1, -2)"), "sum(1, (-2))");
    }

    #[test]
    fn test_unary_minus_against_power() {
        assert_eq!(shape("-2 ^ 2"), "(-(2 ^ 2))");
        assert_eq!(shape("2 ^ -1"), "(2 ^ (-1))");
        assert_eq!(shape("-2 * 3"), "((-2) * 3)");
    }

    #[test]
    fn test_suffix_operator() {
        assert_eq!(shape("3!"), "(3!)");
        assert_eq!(shape("2 * 3!"), "(2 * (3!))");
        assert_eq!(shape("2 ^ 3!"), "(2 ^ (3!))");
        assert_eq!(shape("3! + 1"), "((3!) + 1)");
    }

    #[test]
    fn test_prefix_operator_binds_its_operand() {
        assert_eq!(shape("abs -3 + 1"), "((abs (-3)) + 1)");
        assert_eq!(shape("abs(1 - 3) * 2"), "((abs (1 - 3)) * 2)");
    }

    #[test]
    fn test_implicit_multiplication() {
        assert_eq!(shape("2(3 + 4)"), "(2 * (3 + 4))");
        assert_eq!(shape("2x"), "(2 * x)");
        assert_eq!(shape("x y"), "(x * y)");
        assert_eq!(shape("(1)(2)"), "(1 * 2)");
        assert_eq!(shape("2 sum(1, 2)"), "(2 * sum(1, 2))");
        assert_eq!(shape("2 abs x"), "(2 * (abs x))");
        assert_eq!(shape("1 + 2x ^ 2"), "(1 + (2 * (x ^ 2)))");
        assert_eq!(shape("3!2"), "((3!) * 2)");
    }

    #[test]
    fn test_implicit_multiplication_after_unary_minus() {
        assert_eq!(shape("-2x"), "((-2) * x)");
    }

    #[test]
    fn test_adjacent_operands_without_implicit_multiplication() {
        let mut registry = Registry::new(|text: &str| text.parse::<i64>().map_err(|e| e.to_string()));
        registry
            .register_operator("+", OperatorKind::Infix, 1, |args| Ok(args[0] + args[1]))
            .unwrap();
        let result = Parser::new(&registry).parse_tree("2 3");
        assert!(matches!(result, Err(ExpressionError::Syntax { offset: 2, .. })));
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(shape("pair(1, 2)"), "pair(1, 2)");
        assert_eq!(shape("pair(1 + 2, pair(3, 4))"), "pair((1 + 2), pair(3, 4))");
        assert_eq!(shape("sum()"), "sum()");
        assert_eq!(shape("sum(1, 2, 3, 4)"), "sum(1, 2, 3, 4)");
        assert_eq!(shape("1 + sum(2) * 3"), "(1 + (sum(2) * 3))");
    }

    #[test]
    fn test_zero_parameter_function() {
        assert_eq!(shape("seven()"), "seven()");
        assert_eq!(shape("seven + 1"), "(seven() + 1)");
        assert_eq!(shape("abs(seven)"), "(abs seven())");
    }

    #[test]
    fn test_constants_and_variables_become_variable_leaves() {
        assert_eq!(shape("k + x"), "(k + x)");
    }

    #[test]
    fn test_fixed_arity_mismatch() {
        assert!(matches!(
            parse_error("pair(1)"),
            ExpressionError::Arity {
                expected: 2,
                found: 1,
                ..
            }
        ));
        assert!(matches!(
            parse_error("pair(1, 2, 3)"),
            ExpressionError::Arity {
                expected: 2,
                found: 3,
                ..
            }
        ));
        assert!(matches!(
            parse_error("seven(1)"),
            ExpressionError::Arity {
                expected: 0,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_operands() {
        assert!(matches!(
            parse_error("1 +"),
            ExpressionError::Arity {
                expected: 2,
                found: 1,
                ..
            }
        ));
        assert!(matches!(parse_error("* 3"), ExpressionError::Arity { .. }));
        assert!(matches!(parse_error("(1 +)"), ExpressionError::Arity { .. }));
        assert!(matches!(parse_error("!"), ExpressionError::Arity { .. }));
    }

    #[test]
    fn test_operators_do_not_reach_outside_their_group() {
        assert!(matches!(
            parse_error("1 + sum(2, *)"),
            ExpressionError::Syntax { .. } | ExpressionError::Arity { .. }
        ));
        assert!(matches!(
            parse_error("1 (+)"),
            ExpressionError::Arity { found: 0, .. }
        ));
    }

    #[test]
    fn test_unmatched_parentheses() {
        assert!(matches!(
            parse_error("(1 + 2"),
            ExpressionError::Syntax { offset: 0, .. }
        ));
        assert!(matches!(
            parse_error("sum(1"),
            ExpressionError::Syntax { .. }
        ));
        assert!(matches!(
            parse_error("1 + 2)"),
            ExpressionError::Syntax { offset: 5, .. }
        ));
    }

    #[test]
    fn test_comma_placement() {
        assert!(matches!(parse_error("1, 2"), ExpressionError::Syntax { .. }));
        assert!(matches!(parse_error("(1, 2)"), ExpressionError::Syntax { .. }));
        assert!(matches!(parse_error("sum(, 1)"), ExpressionError::Syntax { .. }));
        assert!(matches!(parse_error("sum(1, )"), ExpressionError::Syntax { .. }));
        assert!(matches!(parse_error("sum(1,, 2)"), ExpressionError::Syntax { .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_error(""), ExpressionError::Syntax { .. }));
        assert!(matches!(parse_error("   "), ExpressionError::Syntax { .. }));
        assert!(matches!(parse_error("()"), ExpressionError::Syntax { .. }));
    }

    #[test]
    fn test_unknown_symbol() {
        assert_eq!(
            parse_error("unknownFn(1)"),
            ExpressionError::UnknownSymbol {
                symbol: "unknownFn".to_string(),
                offset: 0,
            }
        );
        assert!(matches!(
            parse_error("1 + z"),
            ExpressionError::UnknownSymbol { offset: 4, .. }
        ));
    }

    #[test]
    fn test_function_without_call_parentheses() {
        assert!(matches!(parse_error("pair + 1"), ExpressionError::Syntax { .. }));
    }

    #[test]
    fn test_invalid_number_is_a_lex_error() {
        assert!(matches!(
            parse_error("1.5 + 1"),
            ExpressionError::Lex { offset: 0, .. }
        ));
    }

    #[test]
    fn test_lex_error_propagates() {
        assert!(matches!(
            parse_error("1 # 2"),
            ExpressionError::Lex { offset: 2, .. }
        ));
    }

    #[test]
    fn test_parse_expression_snapshots_constants() {
        let registry = registry();
        let expression = Parser::new(&registry).parse_expression("k").unwrap();
        assert_eq!(expression.constants().get("k"), Some(&100));
    }
}
