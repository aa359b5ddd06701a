//! Restricted arithmetic: numeric literals, `+ - * /`, parentheses, whitespace. Nothing else.
//!
//! Formula text comes from the oracle and is untrusted. It is tokenized against a fixed
//! alphabet and evaluated by recursive descent over exact rationals, so `8 / 3 * 3` is
//! exactly 8.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

pub const MAX_FORMULA_LEN: usize = 256;
const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    #[error("forbidden character {0:?} at byte {1}")]
    Forbidden(char, usize),
    #[error("malformed number at byte {0}")]
    BadNumber(usize),
    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("trailing input after formula: {0:?}")]
    TrailingInput(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("formula too long")]
    TooLong,
    #[error("formula nested too deeply")]
    TooDeep,
    #[error("empty formula")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(BigRational),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn parse_literal(s: &str, at: usize) -> Result<BigRational, FormulaError> {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() || (s.contains('.') && frac_part.is_empty()) {
        return Err(FormulaError::BadNumber(at));
    }
    let digits = format!("{int_part}{frac_part}");
    let numer = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or(FormulaError::BadNumber(at))?;
    let denom = num_traits::pow(BigInt::from(10u32), frac_part.len());
    Ok(BigRational::new(numer, denom))
}

fn tokenize(src: &str) -> Result<Vec<Token>, FormulaError> {
    if src.len() > MAX_FORMULA_LEN {
        return Err(FormulaError::TooLong);
    }
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'+' => {
                out.push(Token::Plus);
                i += 1;
            }
            b'-' => {
                out.push(Token::Minus);
                i += 1;
            }
            b'*' => {
                out.push(Token::Star);
                i += 1;
            }
            b'/' => {
                out.push(Token::Slash);
                i += 1;
            }
            b'(' => {
                out.push(Token::LParen);
                i += 1;
            }
            b')' => {
                out.push(Token::RParen);
                i += 1;
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let lit = &src[start..i];
                if lit.matches('.').count() > 1 {
                    return Err(FormulaError::BadNumber(start));
                }
                out.push(Token::Num(parse_literal(lit, start)?));
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('\u{fffd}');
                return Err(FormulaError::Forbidden(ch, i));
            }
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expr(&mut self) -> Result<BigRational, FormulaError> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    acc += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    acc -= self.term()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> Result<BigRational, FormulaError> {
        let mut acc = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    acc *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs.is_zero() {
                        return Err(FormulaError::DivisionByZero);
                    }
                    acc /= rhs;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn unary(&mut self) -> Result<BigRational, FormulaError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FormulaError::TooDeep);
        }
        let v = match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                -self.unary()?
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()?
            }
            _ => self.primary()?,
        };
        self.depth -= 1;
        Ok(v)
    }

    fn primary(&mut self) -> Result<BigRational, FormulaError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let v = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(v),
                    Some(t) => Err(FormulaError::UnexpectedToken(t.to_string())),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(t) => Err(FormulaError::UnexpectedToken(t.to_string())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

/// Evaluate a formula exactly.
pub fn eval_formula(src: &str) -> Result<BigRational, FormulaError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(FormulaError::Empty);
    }
    let mut p = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let v = p.expr()?;
    if p.pos < p.tokens.len() {
        let rest: Vec<String> = p.tokens[p.pos..].iter().map(|t| t.to_string()).collect();
        return Err(FormulaError::TrailingInput(rest.join(" ")));
    }
    Ok(v)
}

pub fn equals_int(v: &BigRational, n: i64) -> bool {
    v.denom().is_one() && *v.numer() == BigInt::from(n)
}

/// Lossy view for reports.
pub fn to_f64(v: &BigRational) -> f64 {
    use num_traits::ToPrimitive;
    v.to_f64().unwrap_or(f64::NAN)
}
