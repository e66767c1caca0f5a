use crate::classifier::Classifier;
use crate::error::ExpressionError;
use crate::types::ConditionalExpr;
use regex::Regex;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// State dialect
// ---------------------------------------------------------------------------
//
// The surface syntax keeps the familiar template form:
//
//     {{.IsSuccessful "db"}} == true && {{.NumFailedJobs}} < 3
//
// but instead of substituting text and reparsing the result as a second
// language, the whole string is parsed once into a typed AST whose accessor
// calls resolve against a `StateReader` at evaluation time. That removes the
// quoting hazards of the intermediate string form while keeping the rule
// that a bare identifier is an opaque string literal, so `foo != bar` needs
// no quotes.

/// The accessor surface exposed to state expressions. Implemented by
/// [`Classifier`]; tests may substitute their own reader.
pub trait StateReader {
    fn is_pending(&self, jobs: &[String]) -> bool;
    fn is_running(&self, jobs: &[String]) -> bool;
    fn is_successful(&self, jobs: &[String]) -> bool;
    fn is_failed(&self, jobs: &[String]) -> bool;
    fn num_pending_jobs(&self) -> i64;
    fn num_running_jobs(&self) -> i64;
    fn num_active_jobs(&self) -> i64;
    fn num_successful_jobs(&self) -> i64;
    fn num_failed_jobs(&self) -> i64;
}

impl StateReader for Classifier {
    fn is_pending(&self, jobs: &[String]) -> bool {
        Classifier::is_pending(self, jobs)
    }
    fn is_running(&self, jobs: &[String]) -> bool {
        Classifier::is_running(self, jobs)
    }
    fn is_successful(&self, jobs: &[String]) -> bool {
        Classifier::is_successful(self, jobs)
    }
    fn is_failed(&self, jobs: &[String]) -> bool {
        Classifier::is_failed(self, jobs)
    }
    fn num_pending_jobs(&self) -> i64 {
        Classifier::num_pending_jobs(self) as i64
    }
    fn num_running_jobs(&self) -> i64 {
        Classifier::num_running_jobs(self) as i64
    }
    fn num_active_jobs(&self) -> i64 {
        Classifier::num_active_jobs(self) as i64
    }
    fn num_successful_jobs(&self) -> i64 {
        Classifier::num_successful_jobs(self) as i64
    }
    fn num_failed_jobs(&self) -> i64 {
        Classifier::num_failed_jobs(self) as i64
    }
}

// ---------------------------------------------------------------------------
// Accessor schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
}

/// Declared parameter schema for each accessor. Argument counts and kinds
/// are validated at parse time, so a misspelled or misused accessor is an
/// admission-time failure rather than a runtime one.
struct AccessorSig {
    name: &'static str,
    /// Minimum number of string arguments; variadic accessors accept more.
    min_args: usize,
    variadic: bool,
    returns: Kind,
}

const ACCESSORS: &[AccessorSig] = &[
    AccessorSig { name: "IsPending", min_args: 1, variadic: true, returns: Kind::Bool },
    AccessorSig { name: "IsRunning", min_args: 1, variadic: true, returns: Kind::Bool },
    AccessorSig { name: "IsSuccessful", min_args: 1, variadic: true, returns: Kind::Bool },
    AccessorSig { name: "IsFailed", min_args: 1, variadic: true, returns: Kind::Bool },
    AccessorSig { name: "NumPendingJobs", min_args: 0, variadic: false, returns: Kind::Int },
    AccessorSig { name: "NumRunningJobs", min_args: 0, variadic: false, returns: Kind::Int },
    AccessorSig { name: "NumActiveJobs", min_args: 0, variadic: false, returns: Kind::Int },
    AccessorSig { name: "NumSuccessfulJobs", min_args: 0, variadic: false, returns: Kind::Int },
    AccessorSig { name: "NumFailedJobs", min_args: 0, variadic: false, returns: Kind::Int },
];

fn lookup_accessor(name: &str) -> Option<&'static AccessorSig> {
    ACCESSORS.iter().find(|sig| sig.name == name)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Accessor { name: String, args: Vec<String> },
    Ident(String),
    Str(String),
    Int(i64),
    True,
    False,
    LParen,
    RParen,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

struct Lexer<'a> {
    expr: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(expr: &'a str) -> Self {
        Lexer {
            expr,
            chars: expr.chars().peekable(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> ExpressionError {
        ExpressionError::Parse {
            expr: self.expr.to_string(),
            reason: reason.into(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();

        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\n' | '\r' => {
                    self.chars.next();
                }
                '{' => tokens.push(self.accessor()?),
                '"' => tokens.push(Token::Str(self.quoted()?)),
                '(' => {
                    self.chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    self.chars.next();
                    tokens.push(Token::RParen);
                }
                '&' => {
                    self.chars.next();
                    if self.chars.next() != Some('&') {
                        return Err(self.error("expected '&&'"));
                    }
                    tokens.push(Token::And);
                }
                '|' => {
                    self.chars.next();
                    if self.chars.next() != Some('|') {
                        return Err(self.error("expected '||'"));
                    }
                    tokens.push(Token::Or);
                }
                '=' => {
                    self.chars.next();
                    if self.chars.next() != Some('=') {
                        return Err(self.error("expected '=='"));
                    }
                    tokens.push(Token::Eq);
                }
                '!' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') {
                        self.chars.next();
                        tokens.push(Token::Ne);
                    } else {
                        tokens.push(Token::Not);
                    }
                }
                '<' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') {
                        self.chars.next();
                        tokens.push(Token::Le);
                    } else {
                        tokens.push(Token::Lt);
                    }
                }
                '>' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'=') {
                        self.chars.next();
                        tokens.push(Token::Ge);
                    } else {
                        tokens.push(Token::Gt);
                    }
                }
                '0'..='9' | '-' => tokens.push(self.number()?),
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.ident();
                    match word.as_str() {
                        "true" => tokens.push(Token::True),
                        "false" => tokens.push(Token::False),
                        _ => tokens.push(Token::Ident(word)),
                    }
                }
                other => return Err(self.error(format!("unexpected character '{other}'"))),
            }
        }

        Ok(tokens)
    }

    /// Parses a `{{.Name "arg" ...}}` tag. Only the dot-accessor form is
    /// recognized; sub-templates and pipelines are not a thing here.
    fn accessor(&mut self) -> Result<Token, ExpressionError> {
        self.chars.next();
        if self.chars.next() != Some('{') {
            return Err(self.error("expected '{{'"));
        }
        self.skip_ws();
        if self.chars.next() != Some('.') {
            return Err(self.error("expected '.' after '{{'"));
        }
        let name = self.ident();
        if name.is_empty() {
            return Err(self.error("expected accessor name after '{{.'"));
        }

        let mut args = Vec::new();
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some('}') => {
                    self.chars.next();
                    if self.chars.next() != Some('}') {
                        return Err(self.error("expected '}}'"));
                    }
                    break;
                }
                Some('"') => args.push(self.quoted()?),
                Some(&other) => {
                    return Err(self.error(format!(
                        "unexpected '{other}' inside accessor tag; arguments must be quoted"
                    )))
                }
                None => return Err(self.error("unterminated accessor tag")),
            }
        }

        Ok(Token::Accessor { name, args })
    }

    fn quoted(&mut self) -> Result<String, ExpressionError> {
        self.chars.next();
        let mut out = String::new();
        for c in self.chars.by_ref() {
            if c == '"' {
                return Ok(out);
            }
            out.push(c);
        }
        Err(self.error("unterminated string literal"))
    }

    fn number(&mut self) -> Result<Token, ExpressionError> {
        let mut out = String::new();
        if self.chars.peek() == Some(&'-') {
            out.push('-');
            self.chars.next();
        }
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| self.error(format!("invalid number '{out}'")))
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(' ' | '\t')) {
            self.chars.next();
        }
    }
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Ast {
    Bool(bool),
    Int(i64),
    Str(String),
    Call { name: String, args: Vec<String> },
    Compare(CmpOp, Box<Ast>, Box<Ast>),
    And(Box<Ast>, Box<Ast>),
    Or(Box<Ast>, Box<Ast>),
    Not(Box<Ast>),
}

struct Parser<'a> {
    expr: &'a str,
    tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> ExpressionError {
        ExpressionError::Parse {
            expr: self.expr.to_string(),
            reason: reason.into(),
        }
    }

    fn parse(mut self) -> Result<Ast, ExpressionError> {
        let ast = self.or_expr()?;
        if let Some(tok) = self.tokens.next() {
            return Err(self.error(format!("trailing input at {tok:?}")));
        }
        Ok(ast)
    }

    fn or_expr(&mut self) -> Result<Ast, ExpressionError> {
        let mut lhs = self.and_expr()?;
        while self.tokens.peek() == Some(&Token::Or) {
            self.tokens.next();
            let rhs = self.and_expr()?;
            lhs = Ast::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Ast, ExpressionError> {
        let mut lhs = self.comparison()?;
        while self.tokens.peek() == Some(&Token::And) {
            self.tokens.next();
            let rhs = self.comparison()?;
            lhs = Ast::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Ast, ExpressionError> {
        let lhs = self.unary()?;
        let op = match self.tokens.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.tokens.next();
        let rhs = self.unary()?;
        Ok(Ast::Compare(op, Box::new(lhs), Box::new(rhs)))
    }

    fn unary(&mut self) -> Result<Ast, ExpressionError> {
        if self.tokens.peek() == Some(&Token::Not) {
            self.tokens.next();
            return Ok(Ast::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Ast, ExpressionError> {
        match self.tokens.next() {
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                if self.tokens.next() != Some(Token::RParen) {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Some(Token::True) => Ok(Ast::Bool(true)),
            Some(Token::False) => Ok(Ast::Bool(false)),
            Some(Token::Int(n)) => Ok(Ast::Int(n)),
            Some(Token::Str(s)) => Ok(Ast::Str(s)),
            // A bare identifier is an opaque string literal.
            Some(Token::Ident(s)) => Ok(Ast::Str(s)),
            Some(Token::Accessor { name, args }) => {
                let sig = lookup_accessor(&name)
                    .ok_or_else(|| ExpressionError::UnknownAccessor(name.clone()))?;
                let arity_ok = if sig.variadic {
                    args.len() >= sig.min_args
                } else {
                    args.len() == sig.min_args
                };
                if !arity_ok {
                    return Err(ExpressionError::BadArity {
                        accessor: name,
                        expected: if sig.variadic {
                            format!("at least {}", sig.min_args)
                        } else {
                            format!("exactly {}", sig.min_args)
                        },
                        got: args.len(),
                    });
                }
                Ok(Ast::Call { name, args })
            }
            Some(tok) => Err(self.error(format!("unexpected token {tok:?}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
        }
    }
}

fn eval(ast: &Ast, expr: &str, state: &dyn StateReader) -> Result<Value, ExpressionError> {
    let type_err = |reason: String| ExpressionError::Type {
        expr: expr.to_string(),
        reason,
    };

    match ast {
        Ast::Bool(b) => Ok(Value::Bool(*b)),
        Ast::Int(n) => Ok(Value::Int(*n)),
        Ast::Str(s) => Ok(Value::Str(s.clone())),

        Ast::Call { name, args } => Ok(match name.as_str() {
            "IsPending" => Value::Bool(state.is_pending(args)),
            "IsRunning" => Value::Bool(state.is_running(args)),
            "IsSuccessful" => Value::Bool(state.is_successful(args)),
            "IsFailed" => Value::Bool(state.is_failed(args)),
            "NumPendingJobs" => Value::Int(state.num_pending_jobs()),
            "NumRunningJobs" => Value::Int(state.num_running_jobs()),
            "NumActiveJobs" => Value::Int(state.num_active_jobs()),
            "NumSuccessfulJobs" => Value::Int(state.num_successful_jobs()),
            "NumFailedJobs" => Value::Int(state.num_failed_jobs()),
            // The parser only admits names from the schema table.
            other => return Err(ExpressionError::UnknownAccessor(other.to_string())),
        }),

        Ast::Compare(op, lhs, rhs) => {
            let lhs = eval(lhs, expr, state)?;
            let rhs = eval(rhs, expr, state)?;
            let result = match (op, &lhs, &rhs) {
                (CmpOp::Eq, Value::Bool(a), Value::Bool(b)) => a == b,
                (CmpOp::Ne, Value::Bool(a), Value::Bool(b)) => a != b,
                (CmpOp::Eq, Value::Int(a), Value::Int(b)) => a == b,
                (CmpOp::Ne, Value::Int(a), Value::Int(b)) => a != b,
                (CmpOp::Eq, Value::Str(a), Value::Str(b)) => a == b,
                (CmpOp::Ne, Value::Str(a), Value::Str(b)) => a != b,
                (CmpOp::Lt, Value::Int(a), Value::Int(b)) => a < b,
                (CmpOp::Le, Value::Int(a), Value::Int(b)) => a <= b,
                (CmpOp::Gt, Value::Int(a), Value::Int(b)) => a > b,
                (CmpOp::Ge, Value::Int(a), Value::Int(b)) => a >= b,
                _ => {
                    return Err(type_err(format!(
                        "cannot compare {} with {}",
                        lhs.kind(),
                        rhs.kind()
                    )))
                }
            };
            Ok(Value::Bool(result))
        }

        Ast::And(lhs, rhs) => {
            let l = as_bool(eval(lhs, expr, state)?, expr)?;
            if !l {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool(eval(rhs, expr, state)?, expr)?))
        }

        Ast::Or(lhs, rhs) => {
            let l = as_bool(eval(lhs, expr, state)?, expr)?;
            if l {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool(eval(rhs, expr, state)?, expr)?))
        }

        Ast::Not(inner) => Ok(Value::Bool(!as_bool(eval(inner, expr, state)?, expr)?)),
    }
}

fn as_bool(value: Value, expr: &str) -> Result<bool, ExpressionError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(ExpressionError::Type {
            expr: expr.to_string(),
            reason: format!("expected bool operand, got {}", other.kind()),
        }),
    }
}

/// Evaluates a state expression against the current classifier state.
/// An empty expression is vacuously true.
pub fn evaluate(expr: &str, state: &dyn StateReader) -> Result<bool, ExpressionError> {
    if expr.trim().is_empty() {
        return Ok(true);
    }

    let tokens = Lexer::new(expr).tokenize()?;
    let ast = Parser {
        expr,
        tokens: tokens.into_iter().peekable(),
    }
    .parse()?;

    match eval(&ast, expr, state)? {
        Value::Bool(b) => Ok(b),
        other => Err(ExpressionError::NotBoolean {
            expr: expr.to_string(),
            got: other.kind().to_string(),
        }),
    }
}

/// Checks a state expression for well-formedness without evaluating it.
/// Used at admission, where no classifier state exists yet.
pub fn check_state_expr(expr: &str) -> Result<(), ExpressionError> {
    if expr.trim().is_empty() {
        return Ok(());
    }
    let tokens = Lexer::new(expr).tokenize()?;
    Parser {
        expr,
        tokens: tokens.into_iter().peekable(),
    }
    .parse()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Metrics dialect
// ---------------------------------------------------------------------------

/// Parsed form of a metrics alert expression:
///
/// ```text
/// avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is below(14) for (1m) every(1m)
/// ```
///
/// Only the syntax is validated here; live evaluation against a metrics
/// backend is the transport layer's business.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsAlert {
    pub reducer: String,
    pub dashboard_uid: String,
    pub panel_id: u64,
    pub metric: String,
    pub from: String,
    pub to: String,
    pub evaluator: String,
    pub params: Vec<f64>,
    pub for_duration: Option<String>,
    pub every: Option<String>,
}

fn metrics_grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Regex::new(
            r"(?m)^(?P<reducer>\w+)\(\)\s+of\s+query\((?P<dashboard>\w+)/(?P<panel>\d+)/(?P<metric>.+),\s+(?P<from>\w+),\s+(?P<to>\w+)\)\s+is\s+(?P<evaluator>\w+)\((?P<params>-*\d*[.,\s]*\d*)\)\s*(for\s+\((?P<for>\w+)\))?\s*(every\((?P<every>\w+)\))?\s*$",
        )
        .expect("metrics grammar must compile")
    })
}

/// Validates a metrics alert expression and returns its named captures.
pub fn parse_metrics(expr: &str) -> Result<MetricsAlert, ExpressionError> {
    let caps = metrics_grammar()
        .captures(expr)
        .ok_or_else(|| ExpressionError::Format(expr.to_string()))?;

    let params = caps["params"]
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| ExpressionError::Format(expr.to_string()))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    Ok(MetricsAlert {
        reducer: caps["reducer"].to_string(),
        dashboard_uid: caps["dashboard"].to_string(),
        panel_id: caps["panel"]
            .parse()
            .map_err(|_| ExpressionError::Format(expr.to_string()))?,
        metric: caps["metric"].to_string(),
        from: caps["from"].to_string(),
        to: caps["to"].to_string(),
        evaluator: caps["evaluator"].to_string(),
        params,
        for_duration: caps.name("for").map(|m| m.as_str().to_string()),
        every: caps.name("every").map(|m| m.as_str().to_string()),
    })
}

// ---------------------------------------------------------------------------
// ConditionalExpr glue
// ---------------------------------------------------------------------------

/// Checks both dialects of a conditional expression for well-formedness.
pub fn check_conditional(expr: &ConditionalExpr) -> Result<(), ExpressionError> {
    if let Some(state) = expr.state.as_deref() {
        check_state_expr(state)?;
    }
    if let Some(metrics) = expr.metrics.as_deref() {
        if !metrics.is_empty() {
            parse_metrics(metrics)?;
        }
    }
    Ok(())
}

impl ConditionalExpr {
    /// Evaluates the state dialect against the classifier. The metrics
    /// dialect is syntax-checked only: whether its alert has fired is
    /// reported through an external side-channel, not computed here. A zero
    /// expression is vacuously true.
    pub fn is_satisfied(&self, state: &dyn StateReader) -> Result<bool, ExpressionError> {
        if self.is_zero() {
            return Ok(true);
        }

        if let Some(metrics) = self.metrics.as_deref() {
            if !metrics.is_empty() {
                parse_metrics(metrics)?;
            }
        }

        match self.state.as_deref() {
            Some(state_expr) if !state_expr.is_empty() => evaluate(state_expr, state),
            _ => Ok(true),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Lifecycle, Phase};

    fn view() -> Classifier {
        let mut view = Classifier::new();
        view.classify("db", &Lifecycle::with_phase(Phase::Success));
        view.classify("web", &Lifecycle::with_phase(Phase::Running));
        view.classify("flaky", &Lifecycle::with_phase(Phase::Failed));
        view
    }

    #[test]
    fn accessor_predicates() {
        let view = view();
        assert!(evaluate(r#"{{.IsSuccessful "db"}}"#, &view).unwrap());
        assert!(evaluate(r#"{{.IsRunning "web"}}"#, &view).unwrap());
        assert!(!evaluate(r#"{{.IsRunning "db"}}"#, &view).unwrap());
        assert!(evaluate(r#"{{.IsFailed "flaky"}} == true"#, &view).unwrap());
    }

    #[test]
    fn variadic_predicates_require_all_names() {
        let mut view = view();
        view.classify("web2", &Lifecycle::with_phase(Phase::Running));
        assert!(evaluate(r#"{{.IsRunning "web" "web2"}}"#, &view).unwrap());
        assert!(!evaluate(r#"{{.IsRunning "web" "db"}}"#, &view).unwrap());
    }

    #[test]
    fn counts_compare_as_integers() {
        let view = view();
        assert!(evaluate(r#"{{.NumFailedJobs}} == 1"#, &view).unwrap());
        assert!(evaluate(r#"{{.NumSuccessfulJobs}} >= 1"#, &view).unwrap());
        assert!(evaluate(r#"{{.NumActiveJobs}} < 5"#, &view).unwrap());
        assert!(!evaluate(r#"{{.NumRunningJobs}} > 1"#, &view).unwrap());
    }

    #[test]
    fn bare_identifiers_are_strings() {
        let view = view();
        assert!(evaluate("foo != bar", &view).unwrap());
        assert!(evaluate("foo == foo", &view).unwrap());
        assert!(!evaluate(r#"foo == "bar""#, &view).unwrap());
    }

    #[test]
    fn boolean_connectives_and_precedence() {
        let view = view();
        // || binds looser than &&.
        assert!(evaluate("true || false && false", &view).unwrap());
        assert!(!evaluate("(true || false) && false", &view).unwrap());
        assert!(evaluate(
            r#"{{.IsSuccessful "db"}} && {{.NumFailedJobs}} <= 1"#,
            &view
        )
        .unwrap());
        assert!(evaluate(r#"!{{.IsRunning "db"}}"#, &view).unwrap());
    }

    #[test]
    fn unknown_accessor_is_a_hard_error() {
        let view = view();
        let err = evaluate(r#"{{.IsGreen "db"}}"#, &view).unwrap_err();
        assert!(matches!(err, ExpressionError::UnknownAccessor(name) if name == "IsGreen"));
    }

    #[test]
    fn arity_checked_at_parse_time() {
        let err = check_state_expr(r#"{{.NumFailedJobs "db"}}"#).unwrap_err();
        assert!(matches!(err, ExpressionError::BadArity { .. }));

        let err = check_state_expr("{{.IsRunning}}").unwrap_err();
        assert!(matches!(err, ExpressionError::BadArity { .. }));
    }

    #[test]
    fn malformed_template_is_a_parse_error() {
        let view = view();
        let err = evaluate(r#"{{.IsRunning "db""#, &view).unwrap_err();
        assert!(matches!(err, ExpressionError::Parse { .. }));

        let err = evaluate("true &&", &view).unwrap_err();
        assert!(matches!(err, ExpressionError::Parse { .. }));
    }

    #[test]
    fn accessor_arguments_must_be_quoted() {
        let view = view();
        let err = evaluate("{{.IsRunning db}}", &view).unwrap_err();
        match err {
            ExpressionError::Parse { reason, .. } => {
                assert!(reason.contains("must be quoted"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_boolean_result_is_rejected() {
        let view = view();
        let err = evaluate("{{.NumFailedJobs}}", &view).unwrap_err();
        assert!(matches!(err, ExpressionError::NotBoolean { .. }));

        let err = evaluate("somestring", &view).unwrap_err();
        assert!(matches!(err, ExpressionError::NotBoolean { .. }));
    }

    #[test]
    fn mixed_kind_comparison_is_a_type_error() {
        let view = view();
        let err = evaluate(r#"{{.NumFailedJobs}} == "one""#, &view).unwrap_err();
        assert!(matches!(err, ExpressionError::Type { .. }));
    }

    #[test]
    fn empty_expression_is_vacuously_true() {
        let view = view();
        assert!(evaluate("", &view).unwrap());
        assert!(evaluate("   ", &view).unwrap());
    }

    #[test]
    fn metrics_grammar_accepts_documented_examples() {
        let examples = [
            "avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is below(14)",
            "avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is below(0.4)",
            "avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is novalue()",
            "avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is withinrange(4, 88)",
            "avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is withinrange(4, 88) for (1m)",
            "avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is withinrange(4, 88) for (1m) every(1m)",
            "avg() of query(summary/152/tx-avg, 1m, now) is below(5000)",
            "avg() of query(summary/152/tx-avg, 1m, now) is below(-5000)",
        ];
        for example in examples {
            parse_metrics(example).unwrap_or_else(|err| panic!("{example}: {err}"));
        }
    }

    #[test]
    fn metrics_named_captures() {
        let alert =
            parse_metrics("avg() of query(wpFnYRwGk/2/bitrate, 15m, now) is withinrange(4, 88) for (1m) every(5m)")
                .unwrap();
        assert_eq!(alert.reducer, "avg");
        assert_eq!(alert.dashboard_uid, "wpFnYRwGk");
        assert_eq!(alert.panel_id, 2);
        assert_eq!(alert.metric, "bitrate");
        assert_eq!(alert.from, "15m");
        assert_eq!(alert.to, "now");
        assert_eq!(alert.evaluator, "withinrange");
        assert_eq!(alert.params, vec![4.0, 88.0]);
        assert_eq!(alert.for_duration.as_deref(), Some("1m"));
        assert_eq!(alert.every.as_deref(), Some("5m"));
    }

    #[test]
    fn metrics_rejects_malformed_queries() {
        let bad = [
            "avg of query(a/1/m, 15m, now) is below(14)",
            "avg() of query(a/x/m, 15m, now) is below(14)",
            "avg() of query(a/1/m) is below(14)",
            "just some words",
        ];
        for expr in bad {
            assert!(
                matches!(parse_metrics(expr), Err(ExpressionError::Format(_))),
                "{expr} should be rejected"
            );
        }
    }

    #[test]
    fn conditional_zero_is_true() {
        let view = view();
        assert!(ConditionalExpr::default().is_satisfied(&view).unwrap());
    }

    #[test]
    fn conditional_state_dialect_drives_the_result() {
        let view = view();
        let expr = ConditionalExpr {
            state: Some(r#"{{.IsSuccessful "db"}}"#.to_string()),
            metrics: None,
        };
        assert!(expr.is_satisfied(&view).unwrap());

        let expr = ConditionalExpr {
            state: Some(r#"{{.IsFailed "db"}}"#.to_string()),
            metrics: None,
        };
        assert!(!expr.is_satisfied(&view).unwrap());
    }

    #[test]
    fn conditional_metrics_dialect_is_syntax_checked() {
        let view = view();
        let expr = ConditionalExpr {
            state: None,
            metrics: Some("not a metrics query".to_string()),
        };
        assert!(expr.is_satisfied(&view).is_err());
        assert!(check_conditional(&expr).is_err());
    }
}
