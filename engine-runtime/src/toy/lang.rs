//! A small total expression language: literals, arithmetic, `string_of_int`, juxtaposition
//! application, and `fn x => expr` closures. Exists only so this workspace's own tests and
//! demo can exercise `compile_function`/`compile_value` end to end without a real engine.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::EngineError;
use crate::exn::{ApplyConvention, ExnValue};

pub type Env = Rc<HashMap<String, ExnValue>>;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Str(String),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Fn,
    FatArrow,
    Raise,
    True,
    False,
    Eof,
}

fn lex(src: &str) -> Result<Vec<Tok>, EngineError> {
    let mut toks = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '+' | '-' | '*' | '/' | '^' => {
                toks.push(Tok::Op(c));
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'>') => {
                toks.push(Tok::FatArrow);
                i += 2;
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        s.push(chars[i + 1]);
                        i += 2;
                    } else {
                        s.push(chars[i]);
                        i += 1;
                    }
                }
                if i >= chars.len() {
                    return Err(EngineError::Eval("unterminated string literal".into()));
                }
                i += 1;
                toks.push(Tok::Str(s));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit) && matches!(toks.last(), None | Some(Tok::Op(_)) | Some(Tok::LParen) | Some(Tok::FatArrow))) => {
                let start = i;
                if c == '-' {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let v: i64 = text
                    .parse()
                    .map_err(|_| EngineError::Eval(format!("bad integer literal {text:?}")))?;
                toks.push(Tok::Int(v));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                toks.push(match word.as_str() {
                    "fn" => Tok::Fn,
                    "raise" => Tok::Raise,
                    "true" => Tok::True,
                    "false" => Tok::False,
                    _ => Tok::Ident(word),
                });
            }
            other => return Err(EngineError::Eval(format!("unexpected character {other:?}"))),
        }
    }
    toks.push(Tok::Eof);
    Ok(toks)
}

#[derive(Debug, Clone)]
enum Ast {
    Int(i64),
    Str(String),
    Bool(bool),
    Ident(String),
    BinOp(char, Box<Ast>, Box<Ast>),
    App(Box<Ast>, Box<Ast>),
    Lambda(String, Box<Ast>),
    Raise(String),
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.pos].clone();
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: &Tok) -> Result<(), EngineError> {
        if self.peek() == want {
            self.pos += 1;
            Ok(())
        } else {
            Err(EngineError::Eval(format!("expected {want:?}, found {:?}", self.peek())))
        }
    }

    fn parse_expr(&mut self) -> Result<Ast, EngineError> {
        let mut lhs = self.parse_term()?;
        while let Tok::Op(op @ ('+' | '-' | '^')) = *self.peek() {
            self.bump();
            let rhs = self.parse_term()?;
            lhs = Ast::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// `*`/`/` bind tighter than `+`/`-`/`^`.
    fn parse_term(&mut self) -> Result<Ast, EngineError> {
        let mut lhs = self.parse_app()?;
        while let Tok::Op(op @ ('*' | '/')) = *self.peek() {
            self.bump();
            let rhs = self.parse_app()?;
            lhs = Ast::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_app(&mut self) -> Result<Ast, EngineError> {
        let mut head = self.parse_atom()?;
        loop {
            match self.peek() {
                Tok::Int(_) | Tok::Str(_) | Tok::Ident(_) | Tok::LParen | Tok::True | Tok::False => {
                    let arg = self.parse_atom()?;
                    head = Ast::App(Box::new(head), Box::new(arg));
                }
                _ => break,
            }
        }
        Ok(head)
    }

    fn parse_atom(&mut self) -> Result<Ast, EngineError> {
        match self.bump() {
            Tok::Int(v) => Ok(Ast::Int(v)),
            Tok::Str(s) => Ok(Ast::Str(s)),
            Tok::True => Ok(Ast::Bool(true)),
            Tok::False => Ok(Ast::Bool(false)),
            Tok::Ident(name) => Ok(Ast::Ident(name)),
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Tok::Fn => {
                let param = match self.bump() {
                    Tok::Ident(name) => name,
                    other => return Err(EngineError::Eval(format!("expected parameter name, found {other:?}"))),
                };
                self.expect(&Tok::FatArrow)?;
                let body = self.parse_expr()?;
                Ok(Ast::Lambda(param, Box::new(body)))
            }
            Tok::Raise => {
                match self.bump() {
                    Tok::Ident(name) if name == "Fail" => {}
                    other => return Err(EngineError::Eval(format!("expected Fail, found {other:?}"))),
                }
                match self.bump() {
                    Tok::Str(msg) => Ok(Ast::Raise(msg)),
                    other => return Err(EngineError::Eval(format!("expected a string message, found {other:?}"))),
                }
            }
            other => Err(EngineError::Eval(format!("unexpected token {other:?}"))),
        }
    }
}

fn parse(src: &str) -> Result<Ast, EngineError> {
    let toks = lex(src)?;
    let mut parser = Parser { toks, pos: 0 };
    let ast = parser.parse_expr()?;
    if *parser.peek() != Tok::Eof {
        return Err(EngineError::Eval(format!("trailing input at {:?}", parser.peek())));
    }
    Ok(ast)
}

/// Resolves a bare identifier used inside an expression. `string_of_int` is the language's own
/// builtin; anything else falls through to the reserved converter-support table (`assert_int`,
/// `__tuple_assemble_N`, …) so those names resolve the same way whether they're evaluated as a
/// top-level `eval_store` or composed into a larger expression (as `compile_function` does).
fn builtin(name: &str) -> Option<ExnValue> {
    match name {
        "string_of_int" => Some(ExnValue::Closure(
            Rc::new(|v| match v {
                ExnValue::Int(i) => Ok(ExnValue::Str(i.to_string())),
                other => Err(EngineError::Shape(format!("string_of_int expects int, got {}", other.kind_name()))),
            }),
            ApplyConvention::Structural,
        )),
        _ => super::reserved(name),
    }
}

fn eval(ast: &Ast, env: &Env) -> Result<ExnValue, EngineError> {
    match ast {
        Ast::Int(v) => Ok(ExnValue::Int(*v)),
        Ast::Str(s) => Ok(ExnValue::Str(s.clone())),
        Ast::Bool(b) => Ok(ExnValue::Bool(*b)),
        Ast::Ident(name) => env
            .get(name)
            .cloned()
            .or_else(|| builtin(name))
            .ok_or_else(|| EngineError::Eval(format!("unbound identifier {name:?}"))),
        Ast::BinOp(op, lhs, rhs) => eval_binop(*op, eval(lhs, env)?, eval(rhs, env)?),
        Ast::App(f, x) => {
            let fv = eval(f, env)?;
            let xv = eval(x, env)?;
            let (closure, _) = fv
                .as_closure()
                .ok_or_else(|| EngineError::Shape(format!("cannot apply a {}", fv.kind_name())))?;
            closure(xv)
        }
        Ast::Lambda(param, body) => {
            let param = param.clone();
            let body = body.clone();
            let captured = Env::clone(env);
            Ok(ExnValue::Closure(
                Rc::new(move |arg| {
                    let mut extended = (*captured).clone();
                    extended.insert(param.clone(), arg);
                    eval(&body, &Rc::new(extended))
                }),
                ApplyConvention::WrapResult,
            ))
        }
        Ast::Raise(msg) => Err(EngineError::Eval(msg.clone())),
    }
}

fn eval_binop(op: char, lhs: ExnValue, rhs: ExnValue) -> Result<ExnValue, EngineError> {
    if op == '^' {
        return match (lhs, rhs) {
            (ExnValue::Str(a), ExnValue::Str(b)) => Ok(ExnValue::Str(a + &b)),
            (a, b) => Err(EngineError::Shape(format!("^ expects two strings, got {} and {}", a.kind_name(), b.kind_name()))),
        };
    }
    match (lhs, rhs) {
        (ExnValue::Int(a), ExnValue::Int(b)) => match op {
            '+' => Ok(ExnValue::Int(a + b)),
            '-' => Ok(ExnValue::Int(a - b)),
            '*' => Ok(ExnValue::Int(a * b)),
            '/' => {
                if b == 0 {
                    Err(EngineError::Eval("division by zero".into()))
                } else {
                    Ok(ExnValue::Int(a / b))
                }
            }
            other => Err(EngineError::Eval(format!("unsupported operator {other:?}"))),
        },
        (a, b) => Err(EngineError::Shape(format!(
            "{op} expects two ints, got {} and {}",
            a.kind_name(),
            b.kind_name()
        ))),
    }
}

/// Parses and evaluates `code` against an empty top-level environment.
pub fn eval_top(code: &str) -> Result<ExnValue, EngineError> {
    let ast = parse(code)?;
    eval(&ast, &Env::new(HashMap::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> ExnValue {
        eval_top(code).unwrap()
    }

    #[test]
    fn arithmetic() {
        assert!(matches!(run("1 + 2 * 3"), ExnValue::Int(7)));
    }

    #[test]
    fn string_concat() {
        assert!(matches!(run("\"a\" ^ \"b\""), ExnValue::Str(s) if s == "ab"));
    }

    #[test]
    fn lambda_and_string_of_int() {
        let ast = parse("fn i => string_of_int (i * i)").unwrap();
        let f = eval(&ast, &Env::new(HashMap::new())).unwrap();
        let (closure, _) = f.as_closure().unwrap();
        let result = closure(ExnValue::Int(123)).unwrap();
        assert!(matches!(result, ExnValue::Str(s) if s == "15129"));
    }

    #[test]
    fn raise_fail_propagates_message() {
        let err = eval_top("raise Fail \"nope\"").unwrap_err();
        assert!(matches!(err, EngineError::Eval(msg) if msg == "nope"));
    }

    #[test]
    fn unbound_identifier_is_an_error() {
        assert!(eval_top("mystery").is_err());
    }
}
