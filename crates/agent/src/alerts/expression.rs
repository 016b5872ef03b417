//! Arithmetic over extracted metric values, e.g. `{0} * 100 + {1}`.
//!
//! Grammar:
//!   expr    := term (('+' | '-') term)*
//!   term    := unary (('*' | '/' | '%') unary)*
//!   unary   := ('-' | '+') unary | primary
//!   primary := NUMBER | '{' INDEX '}' | '(' expr ')'

use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Slot(usize),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Open,
    Close,
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::Open,
            ')' => Token::Close,
            '{' => {
                let mut index = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, d)) if d.is_ascii_digit() => index.push(d),
                        _ => {
                            return Err(Error::Expression(format!(
                                "malformed value reference at offset {} in '{}'",
                                pos, expression
                            )))
                        }
                    }
                }
                let index = index.parse().map_err(|_| {
                    Error::Expression(format!("empty value reference at offset {} in '{}'", pos, expression))
                })?;
                Token::Slot(index)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = c.to_string();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = literal
                    .parse()
                    .map_err(|_| Error::Expression(format!("invalid number '{}' in '{}'", literal, expression)))?;
                Token::Number(number)
            }
            other => {
                return Err(Error::Expression(format!(
                    "unexpected '{}' at offset {} in '{}'",
                    other, pos, expression
                )))
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    values: &'a [Value],
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<f64> {
        let mut acc = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.pos += 1;
                    acc += self.term()?;
                }
                Token::Minus => {
                    self.pos += 1;
                    acc -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<f64> {
        let mut acc = self.unary()?;
        while let Some(op) = self.peek().cloned() {
            match op {
                Token::Star => {
                    self.pos += 1;
                    acc *= self.unary()?;
                }
                Token::Slash | Token::Percent => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(Error::Expression("division by zero".to_string()));
                    }
                    acc = if op == Token::Slash { acc / rhs } else { acc % rhs };
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Slot(index)) => self.slot(index),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(Error::Expression("missing closing parenthesis".to_string())),
                }
            }
            Some(other) => Err(Error::Expression(format!("unexpected token {:?}", other))),
            None => Err(Error::Expression("unexpected end of expression".to_string())),
        }
    }

    fn slot(&self, index: usize) -> Result<f64> {
        let value = self.values.get(index).ok_or_else(|| {
            Error::Expression(format!(
                "{{{}}} is out of range; only {} value(s) were collected",
                index,
                self.values.len()
            ))
        })?;
        numeric(value).ok_or_else(|| Error::Expression(format!("{{{}}} = {} is not numeric", index, value)))
    }
}

/// Numeric view of a collected value. Numeric strings are accepted.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Evaluate `expression`, substituting `{N}` with the N-th collected value.
pub fn evaluate(expression: &str, values: &[Value]) -> Result<f64> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(Error::Expression("empty expression".to_string()));
    }

    let mut parser = Parser { tokens, pos: 0, values };
    let result = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(Error::Expression(format!(
            "unexpected trailing input in '{}'",
            expression
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_linear_expression() {
        let values = vec![json!(1), json!(3)];
        assert_eq!(evaluate("{0} * 100 + 123", &values).unwrap(), 223.0);
        assert_eq!(evaluate("{1} / {0}", &values).unwrap(), 3.0);
    }

    #[test]
    fn test_precedence_parentheses_and_unary() {
        let values = vec![json!(2.5), json!("4")];
        assert_eq!(evaluate("1 + 2 * 3", &[]).unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3", &[]).unwrap(), 9.0);
        assert_eq!(evaluate("-{0} + {1}", &values).unwrap(), 1.5);
        assert_eq!(evaluate("10 % 4", &[]).unwrap(), 2.0);
        assert_eq!(evaluate("100 * ({1} - {0}) / {1}", &values).unwrap(), 37.5);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("", &[]).is_err());
        assert!(evaluate("{0} +", &[json!(1)]).is_err());
        assert!(evaluate("{5}", &[json!(1)]).is_err());
        assert!(evaluate("{0}", &[json!("abc")]).is_err());
        assert!(evaluate("1 / 0", &[]).is_err());
        assert!(evaluate("(1 + 2", &[]).is_err());
        assert!(evaluate("1 2", &[]).is_err());
        assert!(evaluate("import os", &[]).is_err());
    }
}
