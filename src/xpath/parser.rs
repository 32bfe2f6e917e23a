/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::error::BadXPath;
use super::error::description;

const XML_PREFIX: &str = "xml";
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    Self_,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
}

impl Axis {
    fn from_name(name: &str) -> Result<Axis, BadXPath> {
        Ok(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "attribute" => Axis::Attribute,
            "self" => Axis::Self_,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return Err(BadXPath(description::UNKNOWN_AXIS)),
        })
    }

    pub(super) fn is_reverse(&self) -> bool {
        matches!(
            self,
            Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf | Axis::PrecedingSibling
        )
    }
}

#[derive(Debug)]
pub(super) enum NodeTest {
    /// `*`
    Any,
    /// `name` or `prefix:name`, with the prefix resolved to a namespace
    Name { uri: Option<String>, local: String },
    /// `prefix:*`
    Namespace(String),
    Text,
    Node,
}

#[derive(Debug)]
pub(super) struct Step {
    pub(super) axis: Axis,
    pub(super) test: NodeTest,
    pub(super) predicates: Vec<Expr>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum CompareOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Function {
    Not,
    True,
    False,
    Boolean,
    Count,
    Name,
    LocalName,
    NamespaceUri,
    String,
    Concat,
    Contains,
    StartsWith,
    StringLength,
    NormalizeSpace,
    Number,
    Position,
    Last,
}

impl Function {
    fn from_name(name: &str) -> Result<Function, BadXPath> {
        Ok(match name {
            "not" => Function::Not,
            "true" => Function::True,
            "false" => Function::False,
            "boolean" => Function::Boolean,
            "count" => Function::Count,
            "name" => Function::Name,
            "local-name" => Function::LocalName,
            "namespace-uri" => Function::NamespaceUri,
            "string" => Function::String,
            "concat" => Function::Concat,
            "contains" => Function::Contains,
            "starts-with" => Function::StartsWith,
            "string-length" => Function::StringLength,
            "normalize-space" => Function::NormalizeSpace,
            "number" => Function::Number,
            "position" => Function::Position,
            "last" => Function::Last,
            _ => return Err(BadXPath(description::UNKNOWN_FUNCTION)),
        })
    }

    fn arity(&self) -> (usize, usize) {
        match self {
            Function::True | Function::False | Function::Position | Function::Last => (0, 0),
            Function::Not | Function::Boolean | Function::Count => (1, 1),
            Function::Name
            | Function::LocalName
            | Function::NamespaceUri
            | Function::String
            | Function::StringLength
            | Function::NormalizeSpace
            | Function::Number => (0, 1),
            Function::Contains | Function::StartsWith => (2, 2),
            Function::Concat => (2, usize::MAX),
        }
    }
}

#[derive(Debug)]
pub(super) enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
    Path { absolute: bool, steps: Vec<Step> },
    /// A primary expression with predicates, optionally followed by more steps
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DoubleDot,
    At,
    Comma,
    Pipe,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Star,
    Minus,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
    Literal(String),
    Number(f64),
    /// `prefix:*`
    PrefixStar(String),
    /// `name` or `prefix:name`
    Name(String),
    /// A name followed by `::`
    AxisName(String),
    /// A name followed by `(`
    FunctionName(String),
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

struct Lexer<'a> {
    expr: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.expr[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.expr[self.pos..].chars().nth(n)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn ncname(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_name_char(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.expr[start..self.pos]
    }

    // An operator name or a multiplication star is only possible right
    // after something that can end an operand.
    fn after_operand(&self) -> bool {
        match self.tokens.last() {
            None => false,
            Some(token) => matches!(
                token,
                Token::RightParen
                    | Token::RightBracket
                    | Token::Dot
                    | Token::DoubleDot
                    | Token::Star
                    | Token::Literal(_)
                    | Token::Number(_)
                    | Token::Name(_)
                    | Token::PrefixStar(_)
            ),
        }
    }

    fn number(&mut self) -> Result<Token, BadXPath> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !(c.is_ascii_digit() || c == '.') {
                break;
            }
            self.pos += 1;
        }
        self.expr[start..self.pos]
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| BadXPath(description::BAD_CHARACTER))
    }

    fn name(&mut self) -> Result<Token, BadXPath> {
        let start = self.pos;
        self.ncname();
        if self.peek() == Some(':') {
            match self.peek_at(1) {
                Some('*') => {
                    let prefix = self.expr[start..self.pos].to_string();
                    self.pos += 2;
                    return Ok(Token::PrefixStar(prefix));
                }
                Some(c) if is_name_start(c) => {
                    self.pos += 1;
                    self.ncname();
                }
                _ => (),
            }
        }
        let name = self.expr[start..self.pos].to_string();
        if self.after_operand() {
            match name.as_str() {
                "and" => return Ok(Token::And),
                "or" => return Ok(Token::Or),
                _ => return Err(BadXPath(description::UNEXPECTED_TOKEN)),
            }
        }
        let save = self.pos;
        self.skip_whitespace();
        if self.peek() == Some('(') {
            self.pos = save;
            return Ok(Token::FunctionName(name));
        }
        if self.peek() == Some(':') && self.peek_at(1) == Some(':') {
            self.pos += 2;
            return Ok(Token::AxisName(name));
        }
        self.pos = save;
        Ok(Token::Name(name))
    }

    fn literal(&mut self, quote: char) -> Result<Token, BadXPath> {
        let start = self.pos + 1;
        match self.expr[start..].find(quote) {
            Some(len) => {
                self.pos = start + len + 1;
                Ok(Token::Literal(self.expr[start..start + len].to_string()))
            }
            None => Err(BadXPath(description::UNTERMINATED_LITERAL)),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, BadXPath> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                break;
            };
            let next = self.peek_at(1);
            let token = match c {
                '/' if next == Some('/') => {
                    self.pos += 2;
                    Token::DoubleSlash
                }
                '/' => {
                    self.pos += 1;
                    Token::Slash
                }
                '.' if next == Some('.') => {
                    self.pos += 2;
                    Token::DoubleDot
                }
                '.' if next.is_some_and(|c| c.is_ascii_digit()) => self.number()?,
                '.' => {
                    self.pos += 1;
                    Token::Dot
                }
                '!' if next == Some('=') => {
                    self.pos += 2;
                    Token::NotEq
                }
                '<' if next == Some('=') => {
                    self.pos += 2;
                    Token::LessEq
                }
                '>' if next == Some('=') => {
                    self.pos += 2;
                    Token::GreaterEq
                }
                '@' | ',' | '|' | '[' | ']' | '(' | ')' | '*' | '-' | '=' | '<' | '>' => {
                    self.pos += 1;
                    match c {
                        '@' => Token::At,
                        ',' => Token::Comma,
                        '|' => Token::Pipe,
                        '[' => Token::LeftBracket,
                        ']' => Token::RightBracket,
                        '(' => Token::LeftParen,
                        ')' => Token::RightParen,
                        '*' => Token::Star,
                        '-' => Token::Minus,
                        '=' => Token::Eq,
                        '<' => Token::Less,
                        _ => Token::Greater,
                    }
                }
                '\'' | '"' => self.literal(c)?,
                c if c.is_ascii_digit() => self.number()?,
                c if is_name_start(c) => self.name()?,
                _ => return Err(BadXPath(description::BAD_CHARACTER)),
            };
            self.tokens.push(token);
        }
        Ok(self.tokens)
    }
}

/// Recursive descent parser for the supported XPath 1.0 grammar.
pub(super) struct Parser<'n> {
    tokens: Vec<Token>,
    pos: usize,
    namespaces: &'n [(String, String)],
}

impl<'n> Parser<'n> {
    pub(super) fn parse(expression: &str, namespaces: &'n [(String, String)]) -> Result<Expr, BadXPath> {
        let lexer = Lexer {
            expr: expression,
            pos: 0,
            tokens: Vec::new(),
        };
        let tokens = lexer.tokenize()?;
        if tokens.is_empty() {
            return Err(BadXPath(description::EMPTY));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            namespaces,
        };
        let expr = parser.or_expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(BadXPath(description::TRAILING_TOKENS));
        }
        Ok(expr)
    }

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

    fn accept(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), BadXPath> {
        match self.advance() {
            Some(t) if &t == token => Ok(()),
            Some(_) => Err(BadXPath(description::UNEXPECTED_TOKEN)),
            None => Err(BadXPath(description::UNEXPECTED_END)),
        }
    }

    fn resolve(&self, prefix: &str) -> Result<String, BadXPath> {
        if prefix == XML_PREFIX {
            return Ok(XML_NAMESPACE.to_string());
        }
        self.namespaces
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
            .ok_or(BadXPath(description::UNBOUND_PREFIX))
    }

    fn or_expr(&mut self) -> Result<Expr, BadXPath> {
        let mut left = self.and_expr()?;
        while self.accept(&Token::Or) {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, BadXPath> {
        let mut left = self.equality_expr()?;
        while self.accept(&Token::And) {
            let right = self.equality_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality_expr(&mut self) -> Result<Expr, BadXPath> {
        let mut left = self.relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::NotEq) => CompareOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.relational_expr()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn relational_expr(&mut self) -> Result<Expr, BadXPath> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => CompareOp::Less,
                Some(Token::LessEq) => CompareOp::LessEq,
                Some(Token::Greater) => CompareOp::Greater,
                Some(Token::GreaterEq) => CompareOp::GreaterEq,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary_expr()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr, BadXPath> {
        if self.accept(&Token::Minus) {
            let expr = self.unary_expr()?;
            return Ok(Expr::Negate(Box::new(expr)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, BadXPath> {
        let mut left = self.path_expr()?;
        while self.accept(&Token::Pipe) {
            let right = self.path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn path_expr(&mut self) -> Result<Expr, BadXPath> {
        let primary = match self.peek() {
            Some(Token::LeftParen | Token::Literal(_) | Token::Number(_)) => true,
            Some(Token::FunctionName(name)) => name != "text" && name != "node",
            _ => false,
        };
        match self.peek() {
            Some(_) if primary => {
                let primary = self.primary_expr()?;
                let predicates = self.predicates()?;
                let mut steps = Vec::new();
                if self.peek() == Some(&Token::Slash) || self.peek() == Some(&Token::DoubleSlash) {
                    self.relative_path(&mut steps, true)?;
                }
                if predicates.is_empty() && steps.is_empty() {
                    return Ok(primary);
                }
                Ok(Expr::Filter {
                    primary: Box::new(primary),
                    predicates,
                    steps,
                })
            }
            Some(Token::Slash) => {
                self.pos += 1;
                let mut steps = Vec::new();
                if self.starts_step() {
                    self.relative_path(&mut steps, false)?;
                }
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                let mut steps = Vec::new();
                self.relative_path(&mut steps, true)?;
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(_) => {
                let mut steps = Vec::new();
                self.relative_path(&mut steps, false)?;
                Ok(Expr::Path {
                    absolute: false,
                    steps,
                })
            }
            None => Err(BadXPath(description::UNEXPECTED_END)),
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DoubleDot
                    | Token::At
                    | Token::Star
                    | Token::Name(_)
                    | Token::PrefixStar(_)
                    | Token::AxisName(_)
                    | Token::FunctionName(_)
            )
        )
    }

    // Parses steps separated by slashes. When `leading_separator` is set, the
    // path starts with a separator instead of a step.
    fn relative_path(&mut self, steps: &mut Vec<Step>, leading_separator: bool) -> Result<(), BadXPath> {
        let mut need_separator = leading_separator;
        loop {
            if need_separator {
                match self.peek() {
                    Some(Token::Slash) => self.pos += 1,
                    Some(Token::DoubleSlash) => {
                        self.pos += 1;
                        steps.push(Step {
                            axis: Axis::DescendantOrSelf,
                            test: NodeTest::Node,
                            predicates: Vec::new(),
                        });
                    }
                    _ => return Ok(()),
                }
            }
            steps.push(self.step()?);
            need_separator = true;
        }
    }

    fn step(&mut self) -> Result<Step, BadXPath> {
        if self.accept(&Token::Dot) {
            return Ok(Step {
                axis: Axis::Self_,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.accept(&Token::DoubleDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        let axis = match self.peek() {
            Some(Token::At) => {
                self.pos += 1;
                Axis::Attribute
            }
            Some(Token::AxisName(name)) => {
                let axis = Axis::from_name(name)?;
                self.pos += 1;
                axis
            }
            _ => Axis::Child,
        };
        let test = self.node_test()?;
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, BadXPath> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Any),
            Some(Token::PrefixStar(prefix)) => Ok(NodeTest::Namespace(self.resolve(&prefix)?)),
            Some(Token::Name(name)) => match name.split_once(':') {
                Some((prefix, local)) => Ok(NodeTest::Name {
                    uri: Some(self.resolve(prefix)?),
                    local: local.to_string(),
                }),
                None => Ok(NodeTest::Name {
                    uri: None,
                    local: name,
                }),
            },
            Some(Token::FunctionName(name)) => {
                let test = match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    _ => return Err(BadXPath(description::UNKNOWN_NODE_TYPE)),
                };
                self.expect(&Token::LeftParen)?;
                self.expect(&Token::RightParen)?;
                Ok(test)
            }
            Some(_) => Err(BadXPath(description::UNEXPECTED_TOKEN)),
            None => Err(BadXPath(description::UNEXPECTED_END)),
        }
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, BadXPath> {
        let mut predicates = Vec::new();
        while self.accept(&Token::LeftBracket) {
            predicates.push(self.or_expr()?);
            self.expect(&Token::RightBracket)?;
        }
        Ok(predicates)
    }

    fn primary_expr(&mut self) -> Result<Expr, BadXPath> {
        match self.advance() {
            Some(Token::LeftParen) => {
                let expr = self.or_expr()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::FunctionName(name)) => {
                let function = Function::from_name(&name)?;
                self.expect(&Token::LeftParen)?;
                let mut args = Vec::new();
                if !self.accept(&Token::RightParen) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.accept(&Token::RightParen) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                let (min, max) = function.arity();
                if args.len() < min || args.len() > max {
                    return Err(BadXPath(description::ARGUMENT_COUNT));
                }
                Ok(Expr::Call(function, args))
            }
            Some(_) => Err(BadXPath(description::UNEXPECTED_TOKEN)),
            None => Err(BadXPath(description::UNEXPECTED_END)),
        }
    }
}
