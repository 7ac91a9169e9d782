use crate::expr::ast::{BinaryOp, CallTarget, Expr, Literal, UnaryOp};
use crate::expr::token::{Token, tokenize};
use crate::expr::types::EvalError;

/// 解析表达式文本为 AST
///
/// 优先级自低到高: or < and < not < 比较 < 加减 < 乘除 < 一元负号 < 后缀
pub fn parse_expression(input: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EvalError::Syntax("empty expression".to_string()));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(EvalError::Syntax(format!(
            "unexpected token after expression: {:?}",
            token
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), EvalError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(EvalError::Syntax(format!(
                "expected {:?}, found {:?}",
                expected,
                self.peek()
            )))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_additive()?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    /// 后缀链: 属性读取、下标、调用
    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = match self.advance() {
                        Some(Token::Ident(name)) => name,
                        other => {
                            return Err(EvalError::Syntax(format!(
                                "expected attribute name after '.', found {:?}",
                                other
                            )));
                        }
                    };
                    if self.peek() == Some(&Token::LParen) {
                        // 方法调用: object.name(args)
                        self.pos += 1;
                        let args = self.parse_args()?;
                        expr = Expr::Call {
                            target: CallTarget::Method {
                                object: Box::new(expr),
                                name,
                            },
                            args,
                        };
                    } else {
                        expr = Expr::Attr {
                            object: Box::new(expr),
                            name,
                        };
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_or()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Some(Token::LParen) => {
                    // 只有裸名称可以作为自由函数调用
                    let Expr::Name(name) = expr else {
                        return Err(EvalError::Syntax(
                            "only whitelisted functions can be called".to_string(),
                        ));
                    };
                    self.pos += 1;
                    let args = self.parse_args()?;
                    expr = Expr::Call {
                        target: CallTarget::Function(name),
                        args,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Literal::Int(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Literal::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Literal::Str(s))),
            Some(Token::True) => Ok(Expr::Literal(Literal::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Literal::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Literal::Null)),
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            other => Err(EvalError::Syntax(format!(
                "unexpected token: {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Expr {
        Expr::Name(s.to_string())
    }

    #[test]
    fn test_parse_comparison() {
        let expr = parse_expression("status_code == 200").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Eq,
                left: Box::new(name("status_code")),
                right: Box::new(Expr::Literal(Literal::Int(200))),
            }
        );
    }

    #[test]
    fn test_parse_precedence() {
        // 1 + 2 * 3 == 7 and true
        let expr = parse_expression("1 + 2 * 3 == 7 and true").unwrap();
        let Expr::Binary { op: BinaryOp::And, left, .. } = expr else {
            panic!("expected top-level 'and'");
        };
        let Expr::Binary { op: BinaryOp::Eq, left: sum, .. } = *left else {
            panic!("expected '==' under 'and'");
        };
        let Expr::Binary { op: BinaryOp::Add, right: product, .. } = *sum else {
            panic!("expected '+' under '=='");
        };
        assert!(matches!(*product, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_parse_method_call_and_subscript() {
        let expr = parse_expression("response.json()['status']").unwrap();
        assert_eq!(
            expr,
            Expr::Index {
                object: Box::new(Expr::Call {
                    target: CallTarget::Method {
                        object: Box::new(name("response")),
                        name: "json".to_string(),
                    },
                    args: vec![],
                }),
                index: Box::new(Expr::Literal(Literal::Str("status".to_string()))),
            }
        );
    }

    #[test]
    fn test_parse_function_call() {
        let expr = parse_expression("len(variables['items'])").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                target: CallTarget::Function("len".to_string()),
                args: vec![Expr::Index {
                    object: Box::new(name("variables")),
                    index: Box::new(Expr::Literal(Literal::Str("items".to_string()))),
                }],
            }
        );
    }

    #[test]
    fn test_parse_attribute_chain() {
        let expr = parse_expression("response.status_code").unwrap();
        assert_eq!(
            expr,
            Expr::Attr {
                object: Box::new(name("response")),
                name: "status_code".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_not_and_unary_minus() {
        let expr = parse_expression("not -x").unwrap();
        assert_eq!(
            expr,
            Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(name("x")),
                }),
            }
        );
    }

    #[test]
    fn test_reject_statements() {
        // 两个连续名称不是合法表达式（拦截 "import os" 之类的语句）
        assert!(parse_expression("import os").is_err());
        assert!(parse_expression("del x").is_err());
        assert!(parse_expression("x = 1").is_err());
        assert!(parse_expression("lambda x: x").is_err());
    }

    #[test]
    fn test_reject_call_on_non_name() {
        assert!(parse_expression("x[0]()").is_err());
        assert!(parse_expression("'abc'()").is_err());
    }

    #[test]
    fn test_reject_trailing_tokens() {
        assert!(parse_expression("1 2").is_err());
        assert!(parse_expression("").is_err());
        assert!(parse_expression("(1").is_err());
    }
}
