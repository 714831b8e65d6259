//! Expression tokenizer, validator, and evaluator for spreadsheet formulas.
//!
//! Formulas are plain infix arithmetic over numbers and variables:
//!
//! ```bnf
//! Expression ::= Term ( ( "+" | "-" ) Term )*
//! Term       ::= Factor ( ( "*" | "/" ) Factor )*
//! Factor     ::= Number | Variable | "(" Expression ")"
//! Number     ::= floating-point literal, no unary sign
//! Variable   ::= [A-Za-z_][A-Za-z_0-9]*
//! ```
//!
//! Rather than building a syntax tree, [`Expression`] keeps the validated
//! element sequence in source order and evaluates it with a dual-stack
//! operator-precedence walk. Validation happens entirely at construction
//! time: each incoming token is classified into an element and checked
//! against a static adjacency table, so a constructed expression is always
//! well formed and evaluation can treat grammar violations as unreachable.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::errors::{FormulaError, FormulaParseError};

/// Splits formula source text into lexemes.
///
/// Lazily yields non-whitespace substrings in source order: number
/// literals, identifiers, the single-character operators and parentheses,
/// and maximal runs of characters matching no known pattern (those are
/// rejected later, when the expression is built).
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
        }
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(ch) = self.peek() {
            if pred(ch) {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// True when the cursor sits at the start of a number literal.
    fn at_number(&self) -> bool {
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() => true,
            Some('.') => self.peek_second().is_some_and(|ch| ch.is_ascii_digit()),
            _ => false,
        }
    }

    fn read_number(&mut self) {
        self.eat_while(|ch| ch.is_ascii_digit());
        if self.peek() == Some('.') {
            self.bump();
            self.eat_while(|ch| ch.is_ascii_digit());
        }

        // Exponent suffix only counts when a digit actually follows,
        // otherwise "1e" would swallow a trailing identifier.
        if matches!(self.peek(), Some('e' | 'E')) {
            let mark = self.pos;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
                self.eat_while(|ch| ch.is_ascii_digit());
            } else {
                self.pos = mark;
            }
        }
    }

    fn read_identifier(&mut self) {
        self.eat_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    }

    /// Consumes a maximal run of characters that begin no known pattern.
    fn read_unknown(&mut self) {
        while let Some(ch) = self.peek() {
            let known = ch.is_whitespace()
                || ch.is_ascii_alphanumeric()
                || ch == '_'
                || OPERATOR_CHARS.contains(ch)
                || (ch == '.' && self.at_number());
            if known {
                break;
            }
            self.bump();
        }
    }
}

const OPERATOR_CHARS: &str = "+-*/()";

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.eat_while(char::is_whitespace);
        let start = self.pos;
        let ch = self.peek()?;

        if OPERATOR_CHARS.contains(ch) {
            self.bump();
        } else if self.at_number() {
            self.read_number();
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            self.read_identifier();
        } else {
            self.read_unknown();
        }

        Some(&self.src[start..self.pos])
    }
}

/// True for strings matching `[A-Za-z_][A-Za-z_0-9]*`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Arithmetic operator, precedence class carried as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
}

/// Precedence class of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    Additive,
    Multiplicative,
}

impl OpKind {
    pub fn precedence(self) -> Precedence {
        match self {
            OpKind::Add | OpKind::Sub => Precedence::Additive,
            OpKind::Mul | OpKind::Div => Precedence::Multiplicative,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            OpKind::Add => '+',
            OpKind::Sub => '-',
            OpKind::Mul => '*',
            OpKind::Div => '/',
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> Result<f64, FormulaError> {
        match self {
            OpKind::Add => Ok(lhs + rhs),
            OpKind::Sub => Ok(lhs - rhs),
            OpKind::Mul => Ok(lhs * rhs),
            OpKind::Div => {
                if rhs == 0.0 {
                    Err(FormulaError::division_by_zero())
                } else {
                    Ok(lhs / rhs)
                }
            }
        }
    }
}

/// One validated element of a formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Number(f64),
    Variable(String),
    Op(OpKind),
    LeftParen,
    RightParen,
}

/// Element kind used by the adjacency rules. Numbers and variables are
/// interchangeable grammar-wise, so both count as `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Value,
    Operator,
    LeftParen,
    RightParen,
}

impl ElementKind {
    fn describe(self) -> &'static str {
        match self {
            ElementKind::Value => "a value",
            ElementKind::Operator => "an operator",
            ElementKind::LeftParen => "an opening parenthesis",
            ElementKind::RightParen => "a closing parenthesis",
        }
    }
}

/// `ADJACENCY[prev][next]` says whether `next` may directly follow `prev`
/// in a well-formed infix expression. Indexed by `ElementKind` declaration
/// order: value, operator, opening paren, closing paren.
const ADJACENCY: [[bool; 4]; 4] = [
    [false, true, false, true],
    [true, false, true, false],
    [true, false, true, false],
    [false, true, false, true],
];

fn may_follow(prev: ElementKind, next: ElementKind) -> bool {
    ADJACENCY[prev as usize][next as usize]
}

impl Element {
    fn kind(&self) -> ElementKind {
        match self {
            Element::Number(_) | Element::Variable(_) => ElementKind::Value,
            Element::Op(_) => ElementKind::Operator,
            Element::LeftParen => ElementKind::LeftParen,
            Element::RightParen => ElementKind::RightParen,
        }
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Element::Number(n) => out.push_str(&n.to_string()),
            Element::Variable(name) => out.push_str(name),
            Element::Op(op) => out.push(op.symbol()),
            Element::LeftParen => out.push('('),
            Element::RightParen => out.push(')'),
        }
    }
}

/// An immutable, validated spreadsheet formula.
///
/// Construction parses and validates the source text in one pass; a value
/// of this type is always evaluable. Equality, hashing, and display all go
/// through the canonical text, so two formulas that differ only in
/// whitespace (or in variable spellings the normalizer collapses) are the
/// same expression.
///
/// # Examples
///
/// ```
/// use gridcalc::domain::Expression;
///
/// let expr = Expression::new("( 1 + 7 ) / 2").unwrap();
/// assert_eq!(expr.to_string(), "(1+7)/2");
/// assert_eq!(expr.evaluate(|_| None), Ok(4.0));
/// ```
#[derive(Debug, Clone)]
pub struct Expression {
    text: String,
    elements: Vec<Element>,
    variables: HashSet<String>,
}

impl Expression {
    /// Builds an expression with identity normalization and no variable
    /// restrictions.
    pub fn new(source: &str) -> Result<Self, FormulaParseError> {
        Self::with_rules(source, |name| name.to_string(), |_| true)
    }

    /// Builds an expression, normalizing each variable and then checking
    /// it against `is_valid`.
    ///
    /// Normalized variables must still read as identifiers; a normalizer
    /// that mangles a name into something else is a construction error,
    /// as is a variable the validator rejects.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridcalc::domain::Expression;
    ///
    /// let expr = Expression::with_rules(
    ///     "a1 + b2",
    ///     |name| name.to_uppercase(),
    ///     |name| name.len() <= 3,
    /// ).unwrap();
    /// assert_eq!(expr.to_string(), "A1+B2");
    /// ```
    pub fn with_rules<N, V>(
        source: &str,
        normalize: N,
        is_valid: V,
    ) -> Result<Self, FormulaParseError>
    where
        N: Fn(&str) -> String,
        V: Fn(&str) -> bool,
    {
        let mut elements: Vec<Element> = Vec::new();
        let mut variables = HashSet::new();
        let mut open_parens = 0usize;

        for token in Tokenizer::new(source) {
            let element = classify(token, &normalize, &is_valid)?;

            match element {
                Element::LeftParen => open_parens += 1,
                Element::RightParen => {
                    if open_parens == 0 {
                        return Err(FormulaParseError::new(
                            "closing parenthesis with no matching opening parenthesis",
                        ));
                    }
                    open_parens -= 1;
                }
                _ => {}
            }

            match elements.last() {
                None => {
                    if !matches!(element.kind(), ElementKind::Value | ElementKind::LeftParen) {
                        return Err(FormulaParseError::new(format!(
                            "formula cannot start with {}",
                            element.kind().describe()
                        )));
                    }
                }
                Some(prev) => {
                    if !may_follow(prev.kind(), element.kind()) {
                        return Err(FormulaParseError::new(format!(
                            "`{token}` ({}) cannot follow {}",
                            element.kind().describe(),
                            prev.kind().describe()
                        )));
                    }
                }
            }

            if let Element::Variable(name) = &element {
                variables.insert(name.clone());
            }
            elements.push(element);
        }

        let Some(last) = elements.last() else {
            return Err(FormulaParseError::new("formula is empty"));
        };
        if open_parens > 0 {
            return Err(FormulaParseError::new("unclosed parenthesis"));
        }
        if !matches!(last.kind(), ElementKind::Value | ElementKind::RightParen) {
            return Err(FormulaParseError::new(format!(
                "formula cannot end with {}",
                last.kind().describe()
            )));
        }

        let mut text = String::new();
        for element in &elements {
            element.write_canonical(&mut text);
        }

        Ok(Self {
            text,
            elements,
            variables,
        })
    }

    /// Distinct normalized variable names referenced by this expression.
    pub fn variables(&self) -> &HashSet<String> {
        &self.variables
    }

    /// Evaluates the expression, resolving variables through `lookup`.
    ///
    /// A `None` from the lookup means the variable is undefined and stops
    /// evaluation with an error value naming it, as does division by
    /// zero. Evaluation is deterministic and never panics on user input.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridcalc::domain::Expression;
    ///
    /// let expr = Expression::new("1 + A1").unwrap();
    /// let value = expr.evaluate(|name| (name == "A1").then_some(2.0));
    /// assert_eq!(value, Ok(3.0));
    /// ```
    pub fn evaluate<L>(&self, lookup: L) -> Result<f64, FormulaError>
    where
        L: Fn(&str) -> Option<f64>,
    {
        let mut values: Vec<f64> = Vec::new();
        let mut ops: Vec<PendingOp> = Vec::new();

        for element in &self.elements {
            match element {
                Element::Number(n) => push_value(&mut values, &mut ops, *n)?,
                Element::Variable(name) => {
                    let n = lookup(name).ok_or_else(|| FormulaError::undefined_variable(name))?;
                    push_value(&mut values, &mut ops, n)?;
                }
                Element::Op(op) if op.precedence() == Precedence::Additive => {
                    fold_additive(&mut values, &mut ops)?;
                    ops.push(PendingOp::Op(*op));
                }
                Element::Op(op) => ops.push(PendingOp::Op(*op)),
                Element::LeftParen => ops.push(PendingOp::LeftParen),
                Element::RightParen => {
                    fold_additive(&mut values, &mut ops)?;
                    match ops.pop() {
                        Some(PendingOp::LeftParen) => {}
                        other => {
                            unreachable!("validated expression closed a parenthesis over {other:?}")
                        }
                    }
                    fold_multiplicative(&mut values, &mut ops)?;
                }
            }
        }

        fold_additive(&mut values, &mut ops)?;
        match (values.pop(), values.is_empty(), ops.is_empty()) {
            (Some(result), true, true) => Ok(result),
            _ => unreachable!("validated expression left residual stack state"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

/// Classifies one lexeme into a formula element.
fn classify<N, V>(token: &str, normalize: &N, is_valid: &V) -> Result<Element, FormulaParseError>
where
    N: Fn(&str) -> String,
    V: Fn(&str) -> bool,
{
    let first = token
        .chars()
        .next()
        .unwrap_or_else(|| unreachable!("tokenizer never yields empty lexemes"));

    let starts_number = first.is_ascii_digit()
        || (first == '.' && token.chars().nth(1).is_some_and(|ch| ch.is_ascii_digit()));
    if starts_number {
        let n: f64 = token
            .parse()
            .map_err(|_| FormulaParseError::new(format!("invalid number literal `{token}`")))?;
        if !n.is_finite() {
            return Err(FormulaParseError::new(format!(
                "number literal `{token}` is out of range"
            )));
        }
        return Ok(Element::Number(n));
    }

    if is_identifier(token) {
        let name = normalize(token);
        if !is_identifier(&name) {
            return Err(FormulaParseError::new(format!(
                "variable `{token}` normalized to `{name}`, which is not a valid variable name"
            )));
        }
        if !is_valid(&name) {
            return Err(FormulaParseError::new(format!(
                "variable `{name}` is not allowed here"
            )));
        }
        return Ok(Element::Variable(name));
    }

    match token {
        "+" => Ok(Element::Op(OpKind::Add)),
        "-" => Ok(Element::Op(OpKind::Sub)),
        "*" => Ok(Element::Op(OpKind::Mul)),
        "/" => Ok(Element::Op(OpKind::Div)),
        "(" => Ok(Element::LeftParen),
        ")" => Ok(Element::RightParen),
        _ => Err(FormulaParseError::new(format!(
            "unrecognized token `{token}`"
        ))),
    }
}

/// Operator-stack entry during evaluation.
#[derive(Debug, Clone, Copy)]
enum PendingOp {
    Op(OpKind),
    LeftParen,
}

fn pop_value(values: &mut Vec<f64>) -> f64 {
    values
        .pop()
        .unwrap_or_else(|| unreachable!("validated expression ran out of operands"))
}

/// Pushes a resolved value, first folding an exposed multiplicative
/// operator so that `*` and `/` chains stay left-associative.
fn push_value(values: &mut Vec<f64>, ops: &mut Vec<PendingOp>, n: f64) -> Result<(), FormulaError> {
    if let Some(PendingOp::Op(op)) = ops.last().copied() {
        if op.precedence() == Precedence::Multiplicative {
            ops.pop();
            let lhs = pop_value(values);
            values.push(op.apply(lhs, n)?);
            return Ok(());
        }
    }
    values.push(n);
    Ok(())
}

/// Folds a pending additive operator off the stack top, if any.
fn fold_additive(values: &mut Vec<f64>, ops: &mut Vec<PendingOp>) -> Result<(), FormulaError> {
    if let Some(PendingOp::Op(op)) = ops.last().copied() {
        if op.precedence() == Precedence::Additive {
            ops.pop();
            let rhs = pop_value(values);
            let lhs = pop_value(values);
            values.push(op.apply(lhs, rhs)?);
        }
    }
    Ok(())
}

/// Folds a multiplicative operator exposed by a closing parenthesis.
fn fold_multiplicative(
    values: &mut Vec<f64>,
    ops: &mut Vec<PendingOp>,
) -> Result<(), FormulaError> {
    if let Some(PendingOp::Op(op)) = ops.last().copied() {
        if op.precedence() == Precedence::Multiplicative {
            ops.pop();
            let rhs = pop_value(values);
            let lhs = pop_value(values);
            values.push(op.apply(lhs, rhs)?);
        }
    }
    Ok(())
}
