//! The `{{...}}` micro-language: assignments, comparisons, arithmetic and
//! boolean logic over scalar context values.

use ql_core::{QlValue, QuestContext};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalFailure {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("undefined variable \"{0}\"")]
    UndefinedVariable(String),
    #[error("cannot apply \"{op}\" to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("cannot apply \"{op}\" to {operand}")]
    UnaryMismatch {
        op: &'static str,
        operand: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(QlValue),
    Var(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign { name: String, value: Expr },
    Expr(Expr),
}

/// Parsed body of one `{{...}}` span.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub statements: Vec<Statement>,
}

impl Op {
    /// True when every statement mutates state, i.e. the span renders to nothing.
    pub fn is_assignment(&self) -> bool {
        self.statements
            .iter()
            .all(|statement| matches!(statement, Statement::Assign { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// `value` is the last statement's value; `delta` lists assignments in order.
    Evaluated {
        value: QlValue,
        delta: Vec<(String, QlValue)>,
    },
    Unevaluable(EvalFailure),
}

impl Evaluation {
    pub fn value(&self) -> Option<&QlValue> {
        match self {
            Self::Evaluated { value, .. } => Some(value),
            Self::Unevaluable(_) => None,
        }
    }

    /// Folds the assignments into a new context. Unevaluable results change nothing.
    pub fn apply(&self, context: &QuestContext) -> QuestContext {
        let mut next = context.clone();
        if let Self::Evaluated { delta, .. } = self {
            for (name, value) in delta {
                next = next.with(name.clone(), value.clone());
            }
        }
        next
    }
}

/// Recognises text that is exactly one `{{...}}` span; plain prose yields `None`.
pub fn parse_op(text: &str) -> Option<Op> {
    let inner = text
        .trim()
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    parse_op_body(inner).ok()
}

/// Parses the inside of a span: statements separated by `;`.
pub fn parse_op_body(source: &str) -> Result<Op, EvalFailure> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    loop {
        while parser.eat(&Token::Semi) {}
        if parser.at_end() {
            break;
        }
        statements.push(parser.statement()?);
        if !parser.at_end() && !parser.eat(&Token::Semi) {
            return Err(parser.unexpected());
        }
    }
    if statements.is_empty() {
        return Err(EvalFailure::Parse("empty expression".to_string()));
    }
    Ok(Op { statements })
}

/// Parses a bare boolean/arithmetic expression; surrounding `{{ }}` are tolerated.
pub fn parse_expression(source: &str) -> Result<Expr, EvalFailure> {
    let trimmed = source.trim();
    let body = trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .unwrap_or(trimmed);
    let tokens = tokenize(body)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

pub fn evaluate_op(op: &Op, context: &QuestContext) -> Evaluation {
    let mut scope = context.clone();
    let mut delta = Vec::new();
    let mut last = QlValue::Bool(true);
    for statement in &op.statements {
        match statement {
            Statement::Assign { name, value } => match evaluate_expr(value, &scope) {
                Ok(value) => {
                    scope = scope.with(name.clone(), value.clone());
                    delta.push((name.clone(), value.clone()));
                    last = value;
                }
                Err(failure) => return Evaluation::Unevaluable(failure),
            },
            Statement::Expr(expr) => match evaluate_expr(expr, &scope) {
                Ok(value) => last = value,
                Err(failure) => return Evaluation::Unevaluable(failure),
            },
        }
    }
    Evaluation::Evaluated { value: last, delta }
}

pub fn evaluate_expr(expr: &Expr, context: &QuestContext) -> Result<QlValue, EvalFailure> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => context
            .get(name)
            .cloned()
            .ok_or_else(|| EvalFailure::UndefinedVariable(name.clone())),
        Expr::Unary { op, operand } => {
            let value = evaluate_expr(operand, context)?;
            match op {
                UnaryOp::Not => Ok(QlValue::Bool(!value.is_truthy())),
                UnaryOp::Neg => match value {
                    QlValue::Number(number) => Ok(QlValue::Number(-number)),
                    other => Err(EvalFailure::UnaryMismatch {
                        op: "-",
                        operand: other.type_name(),
                    }),
                },
            }
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate_expr(left, context)?;
            match op {
                BinaryOp::And if !left.is_truthy() => return Ok(QlValue::Bool(false)),
                BinaryOp::Or if left.is_truthy() => return Ok(QlValue::Bool(true)),
                BinaryOp::And | BinaryOp::Or => {
                    let right = evaluate_expr(right, context)?;
                    return Ok(QlValue::Bool(right.is_truthy()));
                }
                _ => {}
            }
            let right = evaluate_expr(right, context)?;
            apply_binary(*op, left, right)
        }
    }
}

fn apply_binary(op: BinaryOp, left: QlValue, right: QlValue) -> Result<QlValue, EvalFailure> {
    let mismatch = |left: &QlValue, right: &QlValue| EvalFailure::TypeMismatch {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match op {
        BinaryOp::Eq => Ok(QlValue::Bool(left == right)),
        BinaryOp::Ne => Ok(QlValue::Bool(left != right)),
        BinaryOp::Add => match (&left, &right) {
            (QlValue::Number(a), QlValue::Number(b)) => Ok(QlValue::Number(a + b)),
            (QlValue::String(_), _) | (_, QlValue::String(_)) => {
                Ok(QlValue::String(format!("{}{}", left.to_text(), right.to_text())))
            }
            _ => Err(mismatch(&left, &right)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (QlValue::Number(a), QlValue::Number(b)) = (&left, &right) else {
                return Err(mismatch(&left, &right));
            };
            match op {
                BinaryOp::Sub => Ok(QlValue::Number(a - b)),
                BinaryOp::Mul => Ok(QlValue::Number(a * b)),
                _ if *b == 0.0 => Err(EvalFailure::DivisionByZero),
                BinaryOp::Div => Ok(QlValue::Number(a / b)),
                _ => Ok(QlValue::Number(a % b)),
            }
        }
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (QlValue::Number(a), QlValue::Number(b)) => a.partial_cmp(b),
                (QlValue::String(a), QlValue::String(b)) => Some(a.cmp(b)),
                _ => None,
            }
            .ok_or_else(|| mismatch(&left, &right))?;
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Le => ordering.is_le(),
                _ => ordering.is_ge(),
            };
            Ok(QlValue::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => Ok(QlValue::Bool(match op {
            BinaryOp::And => left.is_truthy() && right.is_truthy(),
            _ => left.is_truthy() || right.is_truthy(),
        })),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Assign,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    LParen,
    RParen,
    Semi,
}

fn tokenize(source: &str) -> Result<Vec<Token>, EvalFailure> {
    let chars = source.chars().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut index = 0usize;

    while index < chars.len() {
        let ch = chars[index];
        let next = chars.get(index + 1).copied();
        if ch.is_whitespace() {
            index += 1;
            continue;
        }

        if ch.is_ascii_digit() || (ch == '.' && next.is_some_and(|c| c.is_ascii_digit())) {
            let start = index;
            while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.') {
                index += 1;
            }
            let raw = chars[start..index].iter().collect::<String>();
            let number = raw
                .parse::<f64>()
                .map_err(|_| EvalFailure::Parse(format!("invalid number \"{}\"", raw)))?;
            tokens.push(Token::Number(number));
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let start = index;
            while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_') {
                index += 1;
            }
            tokens.push(Token::Ident(chars[start..index].iter().collect()));
            continue;
        }

        if ch == '"' || ch == '\'' {
            let quote = ch;
            index += 1;
            let mut value = String::new();
            loop {
                let Some(current) = chars.get(index).copied() else {
                    return Err(EvalFailure::Parse("unterminated string".to_string()));
                };
                index += 1;
                if current == quote {
                    break;
                }
                if current == '\\' {
                    if let Some(escaped) = chars.get(index).copied() {
                        value.push(escaped);
                        index += 1;
                        continue;
                    }
                }
                value.push(current);
            }
            tokens.push(Token::Str(value));
            continue;
        }

        let (token, width) = match (ch, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('&', Some('&')) => (Token::AndAnd, 2),
            ('|', Some('|')) => (Token::OrOr, 2),
            ('=', _) => (Token::Assign, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('!', _) => (Token::Bang, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (';', _) => (Token::Semi, 1),
            _ => {
                return Err(EvalFailure::Parse(format!(
                    "unexpected character '{}'",
                    ch
                )))
            }
        };
        tokens.push(token);
        index += width;
    }

    Ok(tokens)
}

fn is_keyword(name: &str) -> bool {
    matches!(name, "true" | "false" | "and" | "or" | "not")
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == word) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn unexpected(&self) -> EvalFailure {
        match self.peek() {
            Some(token) => EvalFailure::Parse(format!("unexpected token {:?}", token)),
            None => EvalFailure::Parse("unexpected end of expression".to_string()),
        }
    }

    fn statement(&mut self) -> Result<Statement, EvalFailure> {
        if let (Some(Token::Ident(name)), Some(Token::Assign)) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            if is_keyword(name) {
                return Err(EvalFailure::Parse(format!("cannot assign to \"{}\"", name)));
            }
            let name = name.clone();
            self.pos += 2;
            let value = self.expression()?;
            return Ok(Statement::Assign { name, value });
        }
        Ok(Statement::Expr(self.expression()?))
    }

    fn expression(&mut self) -> Result<Expr, EvalFailure> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, EvalFailure> {
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) || self.eat_word("or") {
            let right = self.and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, EvalFailure> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) || self.eat_word("and") {
            let right = self.equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, EvalFailure> {
        let mut left = self.comparison()?;
        loop {
            let op = if self.eat(&Token::Eq) {
                BinaryOp::Eq
            } else if self.eat(&Token::Ne) {
                BinaryOp::Ne
            } else {
                return Ok(left);
            };
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
    }

    fn comparison(&mut self) -> Result<Expr, EvalFailure> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, EvalFailure> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalFailure> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, EvalFailure> {
        if self.eat(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.eat(&Token::Bang) || self.eat_word("not") {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, EvalFailure> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected());
        };
        match token {
            Token::Number(value) => {
                self.pos += 1;
                Ok(Expr::Literal(QlValue::Number(value)))
            }
            Token::Str(value) => {
                self.pos += 1;
                Ok(Expr::Literal(QlValue::String(value)))
            }
            Token::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.pos += 1;
                    Ok(Expr::Literal(QlValue::Bool(name == "true")))
                }
                "and" | "or" | "not" => Err(self.unexpected()),
                _ => {
                    self.pos += 1;
                    Ok(Expr::Var(name))
                }
            },
            Token::LParen => {
                self.pos += 1;
                let inner = self.expression()?;
                if !self.eat(&Token::RParen) {
                    return Err(self.unexpected());
                }
                Ok(inner)
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
