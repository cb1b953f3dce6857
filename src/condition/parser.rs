//! Recursive-descent condition parser
//!
//! ```text
//! Or         := And ('or' And)*
//! And        := Relational ('and' Relational)*
//! Relational := Factor (op Factor)?
//! Factor     := '(' Or ')' | '!' Factor | Name '(' args ')' | value
//! ```

use crate::condition::tokenizer::{malformed_condition, tokenize, Token};
use crate::error::BuildResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    Or(Box<ConditionNode>, Box<ConditionNode>),
    And(Box<ConditionNode>, Box<ConditionNode>),
    Not(Box<ConditionNode>),
    Compare {
        op: CompareOp,
        left: Box<ConditionNode>,
        right: Box<ConditionNode>,
    },
    Function {
        name: String,
        args: Vec<ConditionNode>,
    },
    /// Raw expression text, evaluated through the expression engine
    Value { text: String, quoted: bool },
}

/// Parse condition text; blank text yields `None`
pub fn parse_condition(condition: &str) -> BuildResult<Option<ConditionNode>> {
    if condition.trim().is_empty() {
        return Ok(None);
    }
    let tokens = tokenize(condition)?;
    let mut parser = Parser {
        condition,
        tokens,
        pos: 0,
    };
    let node = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(malformed_condition(
            condition,
            format!("unexpected {:?} after end of expression", token),
        ));
    }
    Ok(Some(node))
}

struct Parser<'a> {
    condition: &'a str,
    tokens: Vec<Token>,
    pos: usize,
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

    fn expect(&mut self, expected: Token) -> BuildResult<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(malformed_condition(
                self.condition,
                format!("expected {:?}, found {:?}", expected, token),
            )),
            None => Err(malformed_condition(
                self.condition,
                format!("expected {:?} before end of expression", expected),
            )),
        }
    }

    fn parse_or(&mut self) -> BuildResult<ConditionNode> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = ConditionNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> BuildResult<ConditionNode> {
        let mut left = self.parse_relational()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_relational()?;
            left = ConditionNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> BuildResult<ConditionNode> {
        let left = self.parse_factor()?;
        let op = match self.peek() {
            Some(Token::Equal) => CompareOp::Equal,
            Some(Token::NotEqual) => CompareOp::NotEqual,
            Some(Token::Less) => CompareOp::Less,
            Some(Token::LessOrEqual) => CompareOp::LessOrEqual,
            Some(Token::Greater) => CompareOp::Greater,
            Some(Token::GreaterOrEqual) => CompareOp::GreaterOrEqual,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_factor()?;
        Ok(ConditionNode::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_factor(&mut self) -> BuildResult<ConditionNode> {
        match self.next() {
            Some(Token::LeftParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Some(Token::Not) => Ok(ConditionNode::Not(Box::new(self.parse_factor()?))),
            Some(Token::Function(name)) => {
                self.expect(Token::LeftParen)?;
                let mut args = Vec::new();
                if self.peek() == Some(&Token::RightParen) {
                    self.pos += 1;
                } else {
                    loop {
                        args.push(self.parse_value()?);
                        match self.next() {
                            Some(Token::Comma) => continue,
                            Some(Token::RightParen) => break,
                            _ => {
                                return Err(malformed_condition(
                                    self.condition,
                                    format!("expected ',' or ')' in call to '{}'", name),
                                ))
                            }
                        }
                    }
                }
                Ok(ConditionNode::Function { name, args })
            }
            Some(Token::Value { text, quoted }) => Ok(ConditionNode::Value { text, quoted }),
            Some(token) => Err(malformed_condition(
                self.condition,
                format!("unexpected {:?}", token),
            )),
            None => Err(malformed_condition(
                self.condition,
                "unexpected end of expression",
            )),
        }
    }

    fn parse_value(&mut self) -> BuildResult<ConditionNode> {
        match self.next() {
            Some(Token::Value { text, quoted }) => Ok(ConditionNode::Value { text, quoted }),
            other => Err(malformed_condition(
                self.condition,
                format!("expected a function argument, found {:?}", other),
            )),
        }
    }
}
