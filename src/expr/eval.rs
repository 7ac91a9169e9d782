use std::collections::BTreeMap;

use regex::Regex;

use crate::expr::ast::{BinaryOp, CallTarget, Expr, Literal, UnaryOp};
use crate::expr::parser::parse_expression;
use crate::expr::types::{EvalError, MatchValue, Value};

/// 求值上下文：每次求值临时组装的名称绑定
///
/// 白名单契约（版本化；新增条目即改变安全边界）:
/// - 名称: 由调用方绑定，管线只绑定 `response` 与 `variables`
/// - 自由函数: `len(x)`、`list(x)`、`regex_match(pattern, subject)`
/// - 方法: `response.json()`、`<match>.group(index)`
/// - 属性: 仅 response 的 `status_code`/`ok`/`text`/`headers`/`reason`
///
/// 上下文从不包含文件系统、进程或解释器内部对象。
#[derive(Debug, Clone, Default)]
pub struct Context {
    bindings: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式绑定一个名称
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

/// 求值表达式并返回原始值
pub fn evaluate(expression: &str, context: &Context) -> Result<Value, EvalError> {
    let ast = parse_expression(expression)?;
    eval_node(&ast, context)
}

/// 求值并按真值规则转换为布尔（条件与断言使用）
pub fn evaluate_boolean(expression: &str, context: &Context) -> Result<bool, EvalError> {
    Ok(evaluate(expression, context)?.is_truthy())
}

/// 求值并返回未转换的值（变量捕获使用）
pub fn evaluate_value(expression: &str, context: &Context) -> Result<Value, EvalError> {
    evaluate(expression, context)
}

fn eval_node(expr: &Expr, ctx: &Context) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(literal) => Ok(eval_literal(literal)),
        Expr::Name(name) => ctx
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Expr::Attr { object, name } => eval_attr(&eval_node(object, ctx)?, name),
        Expr::Index { object, index } => {
            eval_index(&eval_node(object, ctx)?, &eval_node(index, ctx)?)
        }
        Expr::Call { target, args } => eval_call(target, args, ctx),
        Expr::Unary { op, operand } => eval_unary(*op, &eval_node(operand, ctx)?),
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, ctx),
    }
}

fn eval_literal(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

/// 属性读取仅对 response 的只读成员白名单开放
fn eval_attr(object: &Value, name: &str) -> Result<Value, EvalError> {
    match object {
        Value::Response(response) => match name {
            "status_code" => Ok(Value::Int(response.status.code() as i64)),
            "ok" => Ok(Value::Bool(response.is_success())),
            "text" => Ok(Value::Str(response.body.clone())),
            "reason" => Ok(Value::Str(response.status.reason_phrase().to_string())),
            "headers" => Ok(Value::Map(
                response
                    .headers
                    .iter()
                    .map(|(k, v)| {
                        (
                            k.as_str().to_string(),
                            Value::Str(String::from_utf8_lossy(v.as_bytes()).into_owned()),
                        )
                    })
                    .collect(),
            )),
            other => Err(EvalError::ForbiddenAttribute(format!(
                "response.{}",
                other
            ))),
        },
        other => Err(EvalError::ForbiddenAttribute(format!(
            "{}.{}",
            other.type_name(),
            name
        ))),
    }
}

fn eval_index(object: &Value, index: &Value) -> Result<Value, EvalError> {
    match (object, index) {
        (Value::Map(entries), Value::Str(key)) => entries
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::Type(format!("key not found: '{}'", key))),
        (Value::List(items), Value::Int(i)) => {
            let index = normalize_index(*i, items.len())?;
            Ok(items[index].clone())
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let index = normalize_index(*i, chars.len())?;
            Ok(Value::Str(chars[index].to_string()))
        }
        (object, index) => Err(EvalError::Type(format!(
            "cannot index {} with {}",
            object.type_name(),
            index.type_name()
        ))),
    }
}

/// 负下标从序列末尾计数
fn normalize_index(index: i64, len: usize) -> Result<usize, EvalError> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved as usize >= len {
        return Err(EvalError::Type(format!("index out of range: {}", index)));
    }
    Ok(resolved as usize)
}

fn eval_call(target: &CallTarget, args: &[Expr], ctx: &Context) -> Result<Value, EvalError> {
    match target {
        CallTarget::Function(name) => {
            let values = args
                .iter()
                .map(|arg| eval_node(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            match name.as_str() {
                "len" => builtin_len(&values),
                "list" => builtin_list(&values),
                "regex_match" => builtin_regex_match(&values),
                other => Err(EvalError::UnknownFunction(other.to_string())),
            }
        }
        CallTarget::Method { object, name } => {
            let receiver = eval_node(object, ctx)?;
            let values = args
                .iter()
                .map(|arg| eval_node(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            match (&receiver, name.as_str()) {
                (Value::Response(response), "json") => {
                    expect_arity("json", &values, 0)?;
                    let parsed = response
                        .json()
                        .map_err(|e| EvalError::Json(e.to_string()))?;
                    Ok(Value::from_json(&parsed))
                }
                (Value::Match(m), "group") => {
                    expect_arity("group", &values, 1)?;
                    let Value::Int(index) = &values[0] else {
                        return Err(EvalError::Type(
                            "group() expects an integer index".to_string(),
                        ));
                    };
                    if *index < 0 {
                        return Err(EvalError::Type(format!("no such group: {}", index)));
                    }
                    m.group(*index as usize)
                }
                (receiver, name) => Err(EvalError::UnknownMethod(format!(
                    "{}.{}()",
                    receiver.type_name(),
                    name
                ))),
            }
        }
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() != expected {
        return Err(EvalError::Type(format!(
            "{}() takes {} argument(s), got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn builtin_len(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("len", args, 1)?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        other => {
            return Err(EvalError::Type(format!(
                "len() is not defined for {}",
                other.type_name()
            )));
        }
    };
    Ok(Value::Int(len as i64))
}

fn builtin_list(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("list", args, 1)?;
    let items = match &args[0] {
        Value::List(items) => items.clone(),
        Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
        // 映射转换为键列表
        Value::Map(entries) => entries.keys().cloned().map(Value::Str).collect(),
        other => {
            return Err(EvalError::Type(format!(
                "list() is not defined for {}",
                other.type_name()
            )));
        }
    };
    Ok(Value::List(items))
}

/// 从主串起始处做正则匹配；不匹配返回 null
fn builtin_regex_match(args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("regex_match", args, 2)?;
    let (Value::Str(pattern), Value::Str(subject)) = (&args[0], &args[1]) else {
        return Err(EvalError::Type(
            "regex_match() expects (pattern, subject) strings".to_string(),
        ));
    };

    let re = Regex::new(pattern).map_err(|e| EvalError::Regex(e.to_string()))?;
    match re.captures(subject) {
        Some(caps) if caps.get(0).is_some_and(|m| m.start() == 0) => {
            let groups = (0..caps.len())
                .map(|i| caps.get(i).map(|m| m.as_str().to_string()))
                .collect();
            Ok(Value::Match(MatchValue::new(groups)))
        }
        _ => Ok(Value::Null),
    }
}

fn eval_unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => match operand {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(EvalError::Type(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        },
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &Context,
) -> Result<Value, EvalError> {
    // and/or 短路，返回操作数本身的值
    match op {
        BinaryOp::And => {
            let lhs = eval_node(left, ctx)?;
            if !lhs.is_truthy() {
                return Ok(lhs);
            }
            return eval_node(right, ctx);
        }
        BinaryOp::Or => {
            let lhs = eval_node(left, ctx)?;
            if lhs.is_truthy() {
                return Ok(lhs);
            }
            return eval_node(right, ctx);
        }
        _ => {}
    }

    let lhs = eval_node(left, ctx)?;
    let rhs = eval_node(right, ctx)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, &lhs, &rhs),
        BinaryOp::Add => add(&lhs, &rhs),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            numeric_op(op, &lhs, &rhs)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited above"),
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let ordering = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (a, b) => match (as_number(a), as_number(b)) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| EvalError::Type("cannot order NaN".to_string()))?,
            _ => {
                return Err(EvalError::Type(format!(
                    "cannot order {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                )));
            }
        },
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Ok(Value::List(items))
        }
        (a, b) => match (as_number(a), as_number(b)) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => Err(EvalError::Type(format!(
                "cannot add {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ))),
        },
    }
}

fn numeric_op(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) else {
        return Err(EvalError::Type(format!(
            "numeric operator is not defined for {} and {}",
            lhs.type_name(),
            rhs.type_name()
        )));
    };

    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0.0 {
        return Err(EvalError::Type("division by zero".to_string()));
    }

    // 除法总是产生浮点数；其余运算在两个整数间保持整数
    let both_int = matches!((lhs, rhs), (Value::Int(_), Value::Int(_)));
    let result = match op {
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => return Ok(Value::Float(a / b)),
        BinaryOp::Mod => a % b,
        _ => unreachable!(),
    };
    if both_int {
        Ok(Value::Int(result as i64))
    } else {
        Ok(Value::Float(result))
    }
}
