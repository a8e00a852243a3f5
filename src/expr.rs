//! Restricted arithmetic evaluator for the `solve` mode.
//!
//! The grammar is deliberately tiny; nothing the user types is ever handed
//! to a general-purpose interpreter:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := atom ('^' unary)?          -- right-associative
//! atom    := NUMBER | VARIABLE | '(' expr ')'
//! ```
//!
//! `^` binds tighter than unary minus, so `-x^2` is `-(x^2)` and `2^-1` is
//! `0.5`. The only identifier accepted is the configured free variable; any
//! other name (`pi`, `exp`, `__import__`) is an [`EvaluationError`].

use crate::error::EvaluationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Var,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

/// Split `input` into tokens, tagging each with its byte offset.
fn tokenize(input: &str, variable: &str) -> Result<Vec<(Token, usize)>, EvaluationError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            _ => None,
        };
        if let Some(tok) = single {
            tokens.push((tok, i));
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            // Exponent suffix: 1e3, 2.5E-4
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let text = &input[start..i];
            let value: f64 = text.parse().map_err(|_| EvaluationError::BadNumber {
                text: text.to_string(),
                pos: start,
            })?;
            tokens.push((Token::Num(value), start));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let name = &input[start..i];
            if name != variable {
                return Err(EvaluationError::UnknownIdentifier {
                    name: name.to_string(),
                    pos: start,
                    variable: variable.to_string(),
                });
            }
            tokens.push((Token::Var, start));
            continue;
        }

        // Non-ASCII or punctuation outside the grammar
        let ch = input[i..].chars().next().unwrap_or(c);
        return Err(EvaluationError::UnexpectedChar { ch, pos: i });
    }

    Ok(tokens)
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var,
    Neg(Box<Node>),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Div(Box<Node>, Box<Node>),
    Pow(Box<Node>, Box<Node>),
}

/// Longest token stream accepted; also bounds the depth of operator chains.
pub const MAX_TOKENS: usize = 4096;

/// Deepest nesting of parentheses, signs and exponents accepted.
pub const MAX_DEPTH: usize = 256;

struct Parser<'a> {
    tokens: &'a [(Token, usize)],
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, o)| *o).unwrap_or(self.end)
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos).map(|(t, _)| t);
        self.pos += 1;
        t
    }

    fn expr(&mut self) -> Result<Node, EvaluationError> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    lhs = Node::Add(Box::new(lhs), Box::new(self.term()?));
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    lhs = Node::Sub(Box::new(lhs), Box::new(self.term()?));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Node, EvaluationError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    lhs = Node::Mul(Box::new(lhs), Box::new(self.unary()?));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    lhs = Node::Div(Box::new(lhs), Box::new(self.unary()?));
                }
                _ => return Ok(lhs),
            }
        }
    }

    // Every nesting path (parentheses, signs, exponents) passes through here.
    fn unary(&mut self) -> Result<Node, EvaluationError> {
        if self.depth >= MAX_DEPTH {
            return Err(EvaluationError::TooDeep {
                pos: self.offset(),
                max: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let node = self.signed();
        self.depth -= 1;
        node
    }

    fn signed(&mut self) -> Result<Node, EvaluationError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node, EvaluationError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Node, EvaluationError> {
        let pos = self.offset();
        match self.bump().cloned() {
            Some(Token::Num(v)) => Ok(Node::Num(v)),
            Some(Token::Var) => Ok(Node::Var),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(EvaluationError::Syntax {
                        expected: "')'",
                        pos: self.offset(),
                    });
                }
                self.pos += 1;
                Ok(inner)
            }
            _ => Err(EvaluationError::Syntax {
                expected: "a number, the variable, or '('",
                pos,
            }),
        }
    }
}

fn eval(node: &Node, x: f64) -> Result<f64, EvaluationError> {
    Ok(match node {
        Node::Num(v) => *v,
        Node::Var => x,
        Node::Neg(a) => -eval(a, x)?,
        Node::Add(a, b) => eval(a, x)? + eval(b, x)?,
        Node::Sub(a, b) => eval(a, x)? - eval(b, x)?,
        Node::Mul(a, b) => eval(a, x)? * eval(b, x)?,
        Node::Div(a, b) => {
            let d = eval(b, x)?;
            if d == 0.0 {
                return Err(EvaluationError::DivisionByZero);
            }
            eval(a, x)? / d
        }
        Node::Pow(a, b) => eval(a, x)?.powf(eval(b, x)?),
    })
}

/// A parsed expression, reusable across many variable values.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    variable: String,
    root: Node,
}

impl Expression {
    /// Parse `input` with `variable` as the only permitted identifier.
    pub fn parse(input: &str, variable: &str) -> Result<Self, EvaluationError> {
        if input.trim().is_empty() {
            return Err(EvaluationError::Empty);
        }
        let tokens = tokenize(input, variable)?;
        if tokens.len() > MAX_TOKENS {
            return Err(EvaluationError::TooLong {
                tokens: tokens.len(),
                max: MAX_TOKENS,
            });
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: input.len(),
            depth: 0,
        };
        let root = parser.expr()?;
        if parser.pos < tokens.len() {
            return Err(EvaluationError::Syntax {
                expected: "an operator or end of expression",
                pos: parser.offset(),
            });
        }
        Ok(Self {
            source: input.trim().to_string(),
            variable: variable.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Evaluate with the variable bound to `x`.
    pub fn evaluate(&self, x: f64) -> Result<f64, EvaluationError> {
        let y = eval(&self.root, x)?;
        if !y.is_finite() {
            return Err(EvaluationError::NonFinite {
                variable: self.variable.clone(),
                at: x,
            });
        }
        Ok(y)
    }

    /// Evaluate at every point of `sweep`, failing on the first bad sample.
    pub fn sweep(&self, sweep: &Sweep) -> Result<Vec<Sample>, EvaluationError> {
        sweep
            .points()?
            .into_iter()
            .map(|x| self.evaluate(x).map(|y| Sample { x, y }))
            .collect()
    }
}

/// Inclusive range of variable values, stepped evenly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

/// Upper bound on samples in one sweep.
pub const MAX_SWEEP_POINTS: usize = 100_000;

impl Sweep {
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// Sweep with unit step, e.g. `Sweep::unit(-10.0, 10.0)` → 21 points.
    pub fn unit(start: f64, end: f64) -> Self {
        Self::new(start, end, 1.0)
    }

    /// The sample points, `start` and `end` included.
    pub fn points(&self) -> Result<Vec<f64>, EvaluationError> {
        if !(self.start.is_finite() && self.end.is_finite() && self.step.is_finite()) {
            return Err(EvaluationError::InvalidSweep("bounds must be finite".into()));
        }
        if self.step <= 0.0 {
            return Err(EvaluationError::InvalidSweep("step must be positive".into()));
        }
        if self.start > self.end {
            return Err(EvaluationError::InvalidSweep(format!(
                "start {} is greater than end {}",
                self.start, self.end
            )));
        }
        // Small epsilon so 0.1-style steps still land on `end`. Counted in
        // f64 so huge spans are rejected before the integer cast.
        let intervals = ((self.end - self.start) / self.step + 1e-9).floor();
        if !intervals.is_finite() || intervals + 1.0 > MAX_SWEEP_POINTS as f64 {
            return Err(EvaluationError::InvalidSweep(format!(
                "{}..{} in steps of {} exceeds the limit of {MAX_SWEEP_POINTS} points",
                self.start, self.end, self.step
            )));
        }
        let count = intervals as usize + 1;
        Ok((0..count)
            .map(|i| self.start + self.step * i as f64)
            .collect())
    }
}

impl std::str::FromStr for Sweep {
    type Err = EvaluationError;

    /// Parse `"<start>..<end>"` or `"<start>..<end>:<step>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || EvaluationError::InvalidSweep(format!("expected 'start..end[:step]', got '{s}'"));
        let (range, step) = match s.split_once(':') {
            Some((r, st)) => (r, st.trim().parse::<f64>().map_err(|_| bad())?),
            None => (s, 1.0),
        };
        let (a, b) = range.split_once("..").ok_or_else(bad)?;
        let start = a.trim().parse::<f64>().map_err(|_| bad())?;
        let end = b.trim().parse::<f64>().map_err(|_| bad())?;
        Ok(Self::new(start, end, step))
    }
}

/// One `(x, y)` point of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_at(src: &str, x: f64) -> f64 {
        Expression::parse(src, "x").unwrap().evaluate(x).unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval_at("2+3*4", 0.0), 14.0);
        assert_eq!(eval_at("(2+3)*4", 0.0), 20.0);
        assert_eq!(eval_at("2^3^2", 0.0), 512.0);
        assert_eq!(eval_at("-x^2", 3.0), -9.0);
        assert_eq!(eval_at("2^-1", 0.0), 0.5);
        assert_eq!(eval_at("10-4-3", 0.0), 3.0);
        assert_eq!(eval_at("8/4/2", 0.0), 1.0);
        assert_eq!(eval_at("--x", 2.0), 2.0);
    }

    #[test]
    fn numbers_with_fraction_and_exponent() {
        assert_eq!(eval_at("1.5e2 + .5", 0.0), 150.5);
        assert_eq!(eval_at("9.81*x", 2.0), 19.62);
    }

    #[test]
    fn rejects_foreign_identifiers() {
        for src in ["__import__('os')", "y + 1", "pi*x", "exp(x)"] {
            let err = Expression::parse(src, "x").unwrap_err();
            assert!(
                matches!(
                    err,
                    EvaluationError::UnknownIdentifier { .. } | EvaluationError::UnexpectedChar { .. }
                ),
                "{src}: {err:?}"
            );
        }
    }

    #[test]
    fn rejects_unknown_identifier_with_position() {
        match Expression::parse("2*x + y", "x") {
            Err(EvaluationError::UnknownIdentifier { name, pos, .. }) => {
                assert_eq!(name, "y");
                assert_eq!(pos, 6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_syntax() {
        for src in ["", "  ", "2+", "(x", "x)", "2 3", "*2", "1.2.3", "x;"] {
            assert!(Expression::parse(src, "x").is_err(), "accepted {src:?}");
        }
    }

    #[test]
    fn division_by_zero_and_non_finite() {
        let e = Expression::parse("1/x", "x").unwrap();
        assert_eq!(e.evaluate(0.0), Err(EvaluationError::DivisionByZero));
        let big = Expression::parse("10^x", "x").unwrap();
        assert!(matches!(big.evaluate(400.0), Err(EvaluationError::NonFinite { .. })));
    }

    #[test]
    fn constant_expression_is_allowed() {
        assert_eq!(eval_at("(1+2)^2", 99.0), 9.0);
    }

    #[test]
    fn custom_variable_name() {
        let e = Expression::parse("3*t - 1", "t").unwrap();
        assert_eq!(e.evaluate(2.0).unwrap(), 5.0);
        assert!(Expression::parse("3*x", "t").is_err());
    }

    #[test]
    fn sweep_linear_formula() {
        let e = Expression::parse("2*x+3", "x").unwrap();
        let samples = e.sweep(&Sweep::unit(-10.0, 10.0)).unwrap();
        assert_eq!(samples.len(), 21);
        for s in &samples {
            assert_eq!(s.y, 2.0 * s.x + 3.0);
        }
        assert_eq!(samples[0].x, -10.0);
        assert_eq!(samples[20].x, 10.0);
    }

    #[test]
    fn sweep_rejects_spans_too_large_to_count() {
        for sweep in [
            Sweep::new(0.0, 1e300, 1.0),
            Sweep::new(-1e308, 1e308, 1e-300),
            Sweep::new(0.0, 1e6, 1.0),
        ] {
            assert!(
                matches!(sweep.points(), Err(EvaluationError::InvalidSweep(_))),
                "{sweep:?}"
            );
        }
        assert_eq!(
            Sweep::new(1.0, MAX_SWEEP_POINTS as f64, 1.0).points().unwrap().len(),
            MAX_SWEEP_POINTS
        );
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let parens = format!("{}x{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(matches!(
            Expression::parse(&parens, "x"),
            Err(EvaluationError::TooLong { .. })
        ));

        let within_token_limit = format!("{}x{}", "(".repeat(1000), ")".repeat(1000));
        assert!(matches!(
            Expression::parse(&within_token_limit, "x"),
            Err(EvaluationError::TooDeep { max: MAX_DEPTH, .. })
        ));

        let signs = format!("{}x", "-".repeat(2000));
        assert!(matches!(
            Expression::parse(&signs, "x"),
            Err(EvaluationError::TooDeep { .. })
        ));

        let powers = format!("x{}", "^x".repeat(1000));
        assert!(matches!(
            Expression::parse(&powers, "x"),
            Err(EvaluationError::TooDeep { .. })
        ));

        let sum = format!("1{}", "+1".repeat(5000));
        assert!(matches!(
            Expression::parse(&sum, "x"),
            Err(EvaluationError::TooLong { .. })
        ));
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let src = format!("{}x+1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(eval_at(&src, 2.0), 3.0);
        let sum = format!("1{}", "+1".repeat(1000));
        assert_eq!(eval_at(&sum, 0.0), 1001.0);
    }

    #[test]
    fn sweep_fractional_step_reaches_end() {
        let pts = Sweep::new(0.0, 1.0, 0.1).points().unwrap();
        assert_eq!(pts.len(), 11);
        assert!((pts[10] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sweep_rejects_bad_bounds() {
        assert!(Sweep::new(5.0, 1.0, 1.0).points().is_err());
        assert!(Sweep::new(0.0, 1.0, 0.0).points().is_err());
        assert!(Sweep::new(0.0, 1e9, 1.0).points().is_err());
    }

    #[test]
    fn parse_sweep_strings() {
        assert_eq!("-10..10".parse::<Sweep>().unwrap(), Sweep::unit(-10.0, 10.0));
        assert_eq!("0..2:0.5".parse::<Sweep>().unwrap(), Sweep::new(0.0, 2.0, 0.5));
        assert!("0-10".parse::<Sweep>().is_err());
    }
}
