//! Bitmask expressions over flag bands.
//!
//! The default evaluator understands expressions such as
//!
//! ```text
//! l2_flags.LAND and not (l2_flags.CLOUD || l2_flags.ICE)
//! ```
//!
//! - `or`, `||`, `|`
//! - `and`, `&&`, `&`
//! - `not`, `!`, `~`
//! - parentheses, `true`, `false`
//! - `<band>.<FLAG>`: set when all bits of the flag's mask are set
//!
//! Keywords are case-insensitive; band and flag names are not.

use tracing::trace;

use crate::util::{EprCode, Error, Result, TypeId};

use super::{create_raster, Product, Raster};

/// Evaluates a bitmask expression into a `uchar` raster (1 where the
/// expression holds, 0 elsewhere).
pub trait BitmaskEvaluator: Send + Sync {
    fn evaluate(
        &self,
        product: &Product,
        expr: &str,
        x_off: u32,
        y_off: u32,
        raster: &mut Raster,
    ) -> Result<()>;
}

/// Default evaluator for flag expressions.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlagExpressionEvaluator;

// ============================================================================
// Lexer
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
    True,
    False,
}

fn syntax_error(msg: impl Into<String>) -> Error {
    Error::epr(EprCode::IllegalArg, msg)
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '!' | '~' => Token::Not,
            '&' => {
                chars.next_if(|&(_, c)| c == '&');
                Token::And
            }
            '|' => {
                chars.next_if(|&(_, c)| c == '|');
                Token::Or
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut end = pos + c.len_utf8();
                while let Some((p, c)) =
                    chars.next_if(|&(_, c)| c.is_ascii_alphanumeric() || c == '_' || c == '.')
                {
                    end = p + c.len_utf8();
                }
                let word = &expr[pos..end];
                match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(word.to_string()),
                }
            }
            other => {
                return Err(syntax_error(format!(
                    "unexpected character '{}' at {} in \"{}\"",
                    other, pos, expr
                )))
            }
        };
        tokens.push(token);
    }
    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

/// Parsed expression; flag terms index into the term table.
#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Const(bool),
    Term(usize),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// `(band, flag)` names in order of first use
    terms: Vec<(String, String)>,
}

impl Parser {
    fn parse(expr: &str) -> Result<(Expr, Vec<(String, String)>)> {
        let mut parser = Self {
            tokens: tokenize(expr)?,
            pos: 0,
            terms: Vec::new(),
        };
        let tree = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(syntax_error(format!("unexpected trailing input in \"{}\"", expr)));
        }
        Ok((tree, parser.terms))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            lhs = Expr::Or(Box::new(lhs), Box::new(self.and_expr()?));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            lhs = Expr::And(Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.unary()?))),
            Some(Token::True) => Ok(Expr::Const(true)),
            Some(Token::False) => Ok(Expr::Const(false)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(syntax_error("missing ')'")),
                }
            }
            Some(Token::Ident(name)) => {
                let (band, flag) = name
                    .split_once('.')
                    .filter(|(b, f)| !b.is_empty() && !f.is_empty() && !f.contains('.'))
                    .ok_or_else(|| syntax_error(format!("expected <band>.<flag>, got \"{}\"", name)))?;
                let key = (band.to_string(), flag.to_string());
                let index = match self.terms.iter().position(|t| *t == key) {
                    Some(i) => i,
                    None => {
                        self.terms.push(key);
                        self.terms.len() - 1
                    }
                };
                Ok(Expr::Term(index))
            }
            Some(other) => Err(syntax_error(format!("unexpected token {:?}", other))),
            None => Err(syntax_error("unexpected end of expression")),
        }
    }
}

impl Expr {
    fn eval(&self, terms: &[bool]) -> bool {
        match self {
            Self::Const(v) => *v,
            Self::Term(i) => terms[*i],
            Self::Not(e) => !e.eval(terms),
            Self::And(a, b) => a.eval(terms) && b.eval(terms),
            Self::Or(a, b) => a.eval(terms) || b.eval(terms),
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// A flag term bound to a band raster.
struct BoundTerm {
    /// Index into the band rasters
    raster: usize,
    mask: u32,
}

impl BitmaskEvaluator for FlagExpressionEvaluator {
    fn evaluate(
        &self,
        product: &Product,
        expr: &str,
        x_off: u32,
        y_off: u32,
        raster: &mut Raster,
    ) -> Result<()> {
        if raster.data_type() != TypeId::UChar {
            return Err(Error::epr(
                EprCode::IllegalDataType,
                format!("bitmask raster must be uchar, not {}", raster.data_type()),
            ));
        }
        let (tree, terms) = Parser::parse(expr)?;

        let mut band_names: Vec<&str> = Vec::new();
        let mut bound = Vec::with_capacity(terms.len());
        for (band_name, flag_name) in &terms {
            let flag_not_found = || {
                Error::epr(
                    EprCode::FlagNotFound,
                    format!("flag {}.{} not found", band_name, flag_name),
                )
            };
            let band = product.get_band(band_name).map_err(|e| match e {
                Error::NotFound { .. } => flag_not_found(),
                other => other,
            })?;
            let mask = band
                .get_flags()?
                .and_then(|flags| flags.iter().find(|f| f.name == *flag_name))
                .map(|f| f.mask)
                .ok_or_else(flag_not_found)?;
            let slot = match band_names.iter().position(|b| *b == band_name.as_str()) {
                Some(i) => i,
                None => {
                    band_names.push(band_name);
                    band_names.len() - 1
                }
            };
            bound.push(BoundTerm { raster: slot, mask });
        }

        trace!(expr, terms = bound.len(), bands = band_names.len(), "evaluate bitmask");

        let mut band_rasters = Vec::with_capacity(band_names.len());
        for name in &band_names {
            let band = product.get_band(name)?;
            let mut flags = create_raster(
                band.data_type(),
                raster.source_width(),
                raster.source_height(),
                raster.source_step_x(),
                raster.source_step_y(),
            )?;
            band.read_raster_into(x_off, y_off, &mut flags)?;
            band_rasters.push(flags.into_data());
        }

        let view = raster.data();
        let mut out = view.write();
        let mut values = vec![false; bound.len()];
        for y in 0..raster.get_height() as usize {
            for x in 0..raster.get_width() as usize {
                for (value, term) in values.iter_mut().zip(&bound) {
                    let pixel = band_rasters[term.raster].get_f64(x, y).unwrap_or(0.0) as i64 as u32;
                    *value = pixel & term.mask == term.mask;
                }
                out.set_f64(x, y, if tree.eval(&values) { 1.0 } else { 0.0 });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("l2_flags.LAND AND !(l1.X || true)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("l2_flags.LAND".into()),
                Token::And,
                Token::Not,
                Token::LParen,
                Token::Ident("l1.X".into()),
                Token::Or,
                Token::True,
                Token::RParen,
            ]
        );
        assert_eq!(tokenize("a.b & c.d | ~e.f").unwrap().len(), 6);
        assert_eq!(tokenize("a.b $").unwrap_err().code(), Some(2));
    }

    #[test]
    fn test_parse_precedence() {
        let (tree, terms) = Parser::parse("a.X or a.Y and not b.Z").unwrap();
        assert_eq!(terms.len(), 3);
        // or binds loosest
        assert!(tree.eval(&[true, false, true]));
        assert!(!tree.eval(&[false, true, true]));
        assert!(tree.eval(&[false, true, false]));
    }

    #[test]
    fn test_repeated_terms_share_slot() {
        let (_, terms) = Parser::parse("a.X and (a.X or b.Y)").unwrap();
        assert_eq!(terms, vec![("a".into(), "X".into()), ("b".into(), "Y".into())]);
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["", "a.X and", "(a.X", "a.X b.Y", "LAND", "a.b.c", ")"] {
            let err = Parser::parse(bad).unwrap_err();
            assert_eq!(err.code(), Some(2), "{}", bad);
        }
    }
}
