//! Arithmetic Expression Parser
//!
//! Parses the text inside `$(( ))`, C-style for headers, and substring
//! offsets into [`ArithExpr`] trees with C precedence. Evaluation lives in
//! the expansion engine; this module is purely syntactic.

use thiserror::Error;

use crate::ast::{ArithAssignOp, ArithBinaryOp, ArithExpr, ArithUnaryOp};

#[derive(Debug, Clone, Error)]
pub enum ArithParseError {
    #[error("arithmetic: unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("arithmetic: unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("arithmetic: unexpected end of expression")]
    UnexpectedEnd,
    #[error("arithmetic: invalid number '{0}'")]
    InvalidNumber(String),
    #[error("arithmetic: '{0}' is not assignable")]
    NotAssignable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Number(i64),
    Name(String),
    Op(&'static str),
}

/// Parse an arithmetic expression.
pub fn parse(text: &str) -> Result<ArithExpr, ArithParseError> {
    let tokens = tokenize(text)?;
    let mut p = Parser { tokens, pos: 0 };
    let expr = p.parse_comma()?;
    if p.pos < p.tokens.len() {
        return Err(ArithParseError::UnexpectedToken(p.describe_current()));
    }
    Ok(expr)
}

/// Multi-character operators, longest first.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "**", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "++", "--", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", "+", "-", "*", "/", "%", "<", ">", "!", "~", "&", "|",
    "^", "?", ":", "=", "(", ")", ",",
];

fn tokenize(text: &str) -> Result<Vec<Tok>, ArithParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    'outer: while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric()) {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Tok::Number(parse_number(&text)?));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Tok::Name(chars[start..i].iter().collect()));
            continue;
        }

        // `$name` inside arithmetic is the same variable reference as a
        // bare name.
        if c == '$' {
            i += 1;
            continue;
        }

        for op in OPERATORS {
            if chars[i..].iter().collect::<String>().starts_with(op) {
                tokens.push(Tok::Op(op));
                i += op.chars().count();
                continue 'outer;
            }
        }

        return Err(ArithParseError::UnexpectedChar(c));
    }

    Ok(tokens)
}

/// Numeric literals: decimal, `0…` octal, `0x…` hex, `0b…` binary.
fn parse_number(text: &str) -> Result<i64, ArithParseError> {
    let bad = || ArithParseError::InvalidNumber(text.to_string());
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_err(|_| bad());
    }
    if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        return i64::from_str_radix(bin, 2).map_err(|_| bad());
    }
    if text.len() > 1 && text.starts_with('0') {
        return i64::from_str_radix(&text[1..], 8).map_err(|_| bad());
    }
    text.parse::<i64>().map_err(|_| bad())
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn current(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn describe_current(&self) -> String {
        match self.current() {
            Some(Tok::Number(n)) => n.to_string(),
            Some(Tok::Name(n)) => n.clone(),
            Some(Tok::Op(op)) => op.to_string(),
            None => "end of expression".to_string(),
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.peek_op() == Some(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.current() {
            Some(Tok::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn parse_comma(&mut self) -> Result<ArithExpr, ArithParseError> {
        let mut left = self.parse_assignment()?;
        while self.eat_op(",") {
            let right = self.parse_assignment()?;
            left = ArithExpr::Binary {
                op: ArithBinaryOp::Comma,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_assignment(&mut self) -> Result<ArithExpr, ArithParseError> {
        let left = self.parse_ternary()?;

        let assign_op = match self.peek_op() {
            Some("=") => Some(ArithAssignOp::Assign),
            Some("+=") => Some(ArithAssignOp::Add),
            Some("-=") => Some(ArithAssignOp::Sub),
            Some("*=") => Some(ArithAssignOp::Mul),
            Some("/=") => Some(ArithAssignOp::Div),
            Some("%=") => Some(ArithAssignOp::Mod),
            Some("<<=") => Some(ArithAssignOp::Shl),
            Some(">>=") => Some(ArithAssignOp::Shr),
            Some("&=") => Some(ArithAssignOp::And),
            Some("|=") => Some(ArithAssignOp::Or),
            Some("^=") => Some(ArithAssignOp::Xor),
            _ => None,
        };

        if let Some(op) = assign_op {
            let name = match &left {
                ArithExpr::Variable(name) => name.clone(),
                other => return Err(ArithParseError::NotAssignable(format!("{}", other))),
            };
            self.pos += 1;
            let value = self.parse_assignment()?;
            return Ok(ArithExpr::Assignment {
                op,
                name,
                value: Box::new(value),
            });
        }

        Ok(left)
    }

    fn parse_ternary(&mut self) -> Result<ArithExpr, ArithParseError> {
        let condition = self.parse_binary(0)?;
        if self.eat_op("?") {
            let consequent = self.parse_assignment()?;
            if !self.eat_op(":") {
                return Err(ArithParseError::UnexpectedToken(self.describe_current()));
            }
            let alternate = self.parse_ternary()?;
            return Ok(ArithExpr::Ternary {
                condition: Box::new(condition),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }
        Ok(condition)
    }

    /// Binary operator precedence levels, loosest first.
    fn level_ops(level: usize) -> &'static [(&'static str, ArithBinaryOp)] {
        const LEVELS: &[&[(&str, ArithBinaryOp)]] = &[
            &[("||", ArithBinaryOp::LogOr)],
            &[("&&", ArithBinaryOp::LogAnd)],
            &[("|", ArithBinaryOp::BitOr)],
            &[("^", ArithBinaryOp::BitXor)],
            &[("&", ArithBinaryOp::BitAnd)],
            &[("==", ArithBinaryOp::Eq), ("!=", ArithBinaryOp::Ne)],
            &[
                ("<=", ArithBinaryOp::Le),
                (">=", ArithBinaryOp::Ge),
                ("<", ArithBinaryOp::Lt),
                (">", ArithBinaryOp::Gt),
            ],
            &[("<<", ArithBinaryOp::Shl), (">>", ArithBinaryOp::Shr)],
            &[("+", ArithBinaryOp::Add), ("-", ArithBinaryOp::Sub)],
            &[
                ("*", ArithBinaryOp::Mul),
                ("/", ArithBinaryOp::Div),
                ("%", ArithBinaryOp::Mod),
            ],
        ];
        LEVELS.get(level).copied().unwrap_or(&[])
    }

    fn parse_binary(&mut self, level: usize) -> Result<ArithExpr, ArithParseError> {
        if Self::level_ops(level).is_empty() {
            return self.parse_power();
        }

        let mut left = self.parse_binary(level + 1)?;
        'outer: loop {
            for (text, op) in Self::level_ops(level) {
                if self.peek_op() == Some(text) {
                    self.pos += 1;
                    let right = self.parse_binary(level + 1)?;
                    left = ArithExpr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    /// Exponentiation is right-associative.
    fn parse_power(&mut self) -> Result<ArithExpr, ArithParseError> {
        let base = self.parse_unary()?;
        if self.eat_op("**") {
            let exp = self.parse_power()?;
            return Ok(ArithExpr::Binary {
                op: ArithBinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exp),
            });
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<ArithExpr, ArithParseError> {
        let unary = match self.peek_op() {
            Some("-") => Some(ArithUnaryOp::Neg),
            Some("+") => Some(ArithUnaryOp::Pos),
            Some("!") => Some(ArithUnaryOp::Not),
            Some("~") => Some(ArithUnaryOp::BitNot),
            Some("++") => Some(ArithUnaryOp::Inc),
            Some("--") => Some(ArithUnaryOp::Dec),
            _ => None,
        };
        if let Some(op) = unary {
            self.pos += 1;
            let operand = self.parse_unary()?;
            if matches!(op, ArithUnaryOp::Inc | ArithUnaryOp::Dec)
                && !matches!(operand, ArithExpr::Variable(_))
            {
                return Err(ArithParseError::NotAssignable(format!("{}", operand)));
            }
            return Ok(ArithExpr::Unary {
                op,
                operand: Box::new(operand),
                prefix: true,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<ArithExpr, ArithParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            let op = match self.peek_op() {
                Some("++") => ArithUnaryOp::Inc,
                Some("--") => ArithUnaryOp::Dec,
                _ => break,
            };
            if !matches!(expr, ArithExpr::Variable(_)) {
                return Err(ArithParseError::NotAssignable(format!("{}", expr)));
            }
            self.pos += 1;
            expr = ArithExpr::Unary {
                op,
                operand: Box::new(expr),
                prefix: false,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<ArithExpr, ArithParseError> {
        match self.current().cloned() {
            Some(Tok::Number(n)) => {
                self.pos += 1;
                Ok(ArithExpr::Number(n))
            }
            Some(Tok::Name(name)) => {
                self.pos += 1;
                Ok(ArithExpr::Variable(name))
            }
            Some(Tok::Op("(")) => {
                self.pos += 1;
                let inner = self.parse_comma()?;
                if !self.eat_op(")") {
                    return Err(ArithParseError::UnexpectedToken(self.describe_current()));
                }
                Ok(ArithExpr::Group(Box::new(inner)))
            }
            Some(Tok::Op(op)) => Err(ArithParseError::UnexpectedToken(op.to_string())),
            None => Err(ArithParseError::UnexpectedEnd),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
