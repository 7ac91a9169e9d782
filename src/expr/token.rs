use crate::expr::types::EvalError;

/// 表达式词法单元
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
}

/// 将表达式文本切分为词法单元
///
/// 语法中不存在赋值、语句与 import；包含 "__" 的标识符直接拒绝，
/// 使内部名称无法从任何表达式触达。
pub fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Eq);
                    i += 2;
                } else {
                    return Err(EvalError::Syntax(
                        "'=' is not an operator; assignment is not supported".to_string(),
                    ));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    return Err(EvalError::Syntax("expected '=' after '!'".to_string()));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let (literal, consumed) = lex_string(&chars[i..], c)?;
                tokens.push(Token::Str(literal));
                i += consumed;
            }
            '0'..='9' => {
                let (token, consumed) = lex_number(&chars[i..]);
                tokens.push(token);
                i += consumed;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let (token, consumed) = lex_ident(&chars[i..])?;
                tokens.push(token);
                i += consumed;
            }
            other => {
                return Err(EvalError::Syntax(format!(
                    "unexpected character '{}'",
                    other
                )));
            }
        }
    }

    Ok(tokens)
}

/// 字符串字面量，支持单双引号与 \\ \' \" \n \t \r 转义；
/// 其它反斜杠序列原样保留
fn lex_string(chars: &[char], quote: char) -> Result<(String, usize), EvalError> {
    let mut out = String::new();
    let mut i = 1;

    while i < chars.len() {
        match chars[i] {
            c if c == quote => return Ok((out, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| EvalError::Syntax("unterminated string literal".to_string()))?;
                match escaped {
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    // 其余转义保留反斜杠，正则模式（\d、\. 等）原样通过
                    other => {
                        out.push('\\');
                        out.push(*other);
                    }
                }
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(EvalError::Syntax("unterminated string literal".to_string()))
}

fn lex_number(chars: &[char]) -> (Token, usize) {
    let mut i = 0;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }

    // 小数点后必须跟数字，否则将 '.' 留给属性访问
    let mut is_float = false;
    if i < chars.len()
        && chars[i] == '.'
        && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit())
    {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }

    let text: String = chars[..i].iter().collect();
    if is_float {
        (Token::Float(text.parse().unwrap_or(f64::NAN)), i)
    } else {
        match text.parse::<i64>() {
            Ok(n) => (Token::Int(n), i),
            // 超出 i64 范围的整数退化为浮点数
            Err(_) => (Token::Float(text.parse().unwrap_or(f64::NAN)), i),
        }
    }
}

fn lex_ident(chars: &[char]) -> Result<(Token, usize), EvalError> {
    let mut i = 0;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
        i += 1;
    }

    let text: String = chars[..i].iter().collect();
    if text.contains("__") {
        return Err(EvalError::ForbiddenName(text));
    }

    let token = match text.as_str() {
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        _ => Token::Ident(text),
    };
    Ok((token, i))
}
