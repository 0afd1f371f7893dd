//! Template lexing and parsing.

use hive_core::Value;

use crate::error::{TemplateError, TemplateResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Commands separated by `|`; each result is appended to the next
/// command's arguments.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub(crate) commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub(crate) args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Dot,
    Field(Vec<String>),
    Literal(Value),
    Function(String),
    Nested(Pipeline),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dot,
    Field(Vec<String>),
    Ident(String),
    Literal(Value),
    Pipe,
    LParen,
    RParen,
}

enum Segment {
    Text(String),
    Action { tokens: Vec<Token>, offset: usize },
}

/// How a nested list ended.
enum Terminator {
    Else(Vec<Token>, usize),
    End,
}

pub(crate) fn parse(source: &str) -> TemplateResult<Vec<Node>> {
    let segments = split_segments(source)?;
    let mut parser = Parser {
        segments: segments.into_iter(),
    };
    let (nodes, terminator) = parser.parse_list()?;
    match terminator {
        None => Ok(nodes),
        Some(Terminator::End) => Err(TemplateError::parse(source.len(), "unexpected {{end}}")),
        Some(Terminator::Else(_, offset)) => {
            Err(TemplateError::parse(offset, "unexpected {{else}}"))
        }
    }
}

// =============================================================================
// Segments
// =============================================================================

fn split_segments(source: &str) -> TemplateResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    while let Some(found) = source[pos..].find("{{") {
        let open = pos + found;
        let mut text = &source[pos..open];
        if trim_next {
            text = text.trim_start();
        }

        let mut body_start = open + 2;
        if source[body_start..].starts_with('-')
            && source[body_start + 1..].starts_with(char::is_whitespace)
        {
            text = text.trim_end();
            body_start += 1;
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text.to_string()));
        }

        let close = find_close(source, body_start)?;
        let mut body_end = close;
        trim_next = false;
        if source[..close].ends_with('-')
            && source[..close - 1].ends_with(char::is_whitespace)
            && close - 1 >= body_start
        {
            body_end = close - 1;
            trim_next = true;
        }

        let body = source[body_start..body_end].trim();
        if !(body.starts_with("/*") && body.ends_with("*/")) {
            let tokens = tokenize(body, body_start)?;
            if tokens.is_empty() {
                return Err(TemplateError::parse(open, "missing value for command"));
            }
            segments.push(Segment::Action {
                tokens,
                offset: open,
            });
        }
        pos = close + 2;
    }

    let mut rest = &source[pos..];
    if trim_next {
        rest = rest.trim_start();
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

/// Finds the `}}` closing the action starting at `from`, skipping quoted
/// strings.
fn find_close(source: &str, from: usize) -> TemplateResult<usize> {
    let bytes = source.as_bytes();
    let mut i = from;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let byte = bytes[i];
        match quote {
            Some(b'"') if byte == b'\\' => i += 1,
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None if byte == b'"' || byte == b'`' => quote = Some(byte),
            None if byte == b'}' && bytes.get(i + 1) == Some(&b'}') => return Ok(i),
            None => {}
        }
        i += 1;
    }
    Err(TemplateError::parse(from, "unclosed action"))
}

// =============================================================================
// Tokens
// =============================================================================

fn tokenize(body: &str, base: usize) -> TemplateResult<Vec<Token>> {
    let chars: Vec<(usize, char)> = body.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (at, c) = chars[i];
        let offset = base + at;
        match c {
            c if c.is_whitespace() => i += 1,
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' => {
                let mut text = String::new();
                i += 1;
                loop {
                    let Some(&(_, c)) = chars.get(i) else {
                        return Err(TemplateError::parse(offset, "unterminated quoted string"));
                    };
                    i += 1;
                    match c {
                        '"' => break,
                        '\\' => {
                            let Some(&(_, escaped)) = chars.get(i) else {
                                return Err(TemplateError::parse(offset, "unterminated escape"));
                            };
                            i += 1;
                            text.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => other,
                            });
                        }
                        c => text.push(c),
                    }
                }
                tokens.push(Token::Literal(Value::String(text)));
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&(_, c)| c == '`')
                    .map(|p| start + p)
                    .ok_or_else(|| TemplateError::parse(offset, "unterminated raw string"))?;
                let text: String = chars[start..end].iter().map(|&(_, c)| c).collect();
                tokens.push(Token::Literal(Value::String(text)));
                i = end + 1;
            }
            '.' => {
                let mut path = Vec::new();
                while chars.get(i).is_some_and(|&(_, c)| c == '.')
                    && chars.get(i + 1).is_some_and(|&(_, c)| is_ident_start(c))
                {
                    let start = i + 1;
                    let mut end = start;
                    while chars.get(end).is_some_and(|&(_, c)| is_ident_char(c)) {
                        end += 1;
                    }
                    path.push(chars[start..end].iter().map(|&(_, c)| c).collect());
                    i = end;
                }
                if path.is_empty() {
                    tokens.push(Token::Dot);
                    i += 1;
                } else {
                    tokens.push(Token::Field(path));
                }
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '+')
                    && chars.get(i + 1).is_some_and(|&(_, n)| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while let Some(&(_, c)) = chars.get(i) {
                    let exponent_sign = (c == '-' || c == '+')
                        && matches!(chars.get(i - 1), Some(&(_, 'e' | 'E')));
                    if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                tokens.push(Token::Literal(parse_number(&text, offset)?));
            }
            c if is_ident_start(c) => {
                let start = i;
                while chars.get(i).is_some_and(|&(_, c)| is_ident_char(c)) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                tokens.push(match ident.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "nil" => Token::Literal(Value::Null),
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(TemplateError::parse(
                    offset,
                    format!("unexpected {other:?} in command"),
                ));
            }
        }
    }
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn parse_number(text: &str, offset: usize) -> TemplateResult<Value> {
    let cleaned = text.replace('_', "");
    if let Ok(i) = cleaned.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    cleaned
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| TemplateError::parse(offset, format!("bad number syntax: {text:?}")))
}

// =============================================================================
// Parser
// =============================================================================

struct Parser {
    segments: std::vec::IntoIter<Segment>,
}

impl Parser {
    fn parse_list(&mut self) -> TemplateResult<(Vec<Node>, Option<Terminator>)> {
        let mut nodes = Vec::new();
        while let Some(segment) = self.segments.next() {
            let (tokens, offset) = match segment {
                Segment::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Segment::Action { tokens, offset } => (tokens, offset),
            };
            match tokens.first() {
                Some(Token::Ident(keyword)) if keyword == "if" => {
                    nodes.push(self.parse_if(&tokens[1..], offset)?);
                }
                Some(Token::Ident(keyword)) if keyword == "range" => {
                    nodes.push(self.parse_range(&tokens[1..], offset)?);
                }
                Some(Token::Ident(keyword)) if keyword == "else" => {
                    return Ok((nodes, Some(Terminator::Else(tokens[1..].to_vec(), offset))));
                }
                Some(Token::Ident(keyword)) if keyword == "end" => {
                    if tokens.len() > 1 {
                        return Err(TemplateError::parse(offset, "unexpected tokens after end"));
                    }
                    return Ok((nodes, Some(Terminator::End)));
                }
                _ => nodes.push(Node::Action(parse_pipeline(&tokens, offset)?)),
            }
        }
        Ok((nodes, None))
    }

    fn parse_if(&mut self, condition: &[Token], offset: usize) -> TemplateResult<Node> {
        let mut branches = Vec::new();
        let mut condition = parse_pipeline(condition, offset)?;
        loop {
            let (body, terminator) = self.parse_list()?;
            branches.push((condition, body));
            match terminator {
                Some(Terminator::End) => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
                Some(Terminator::Else(rest, else_offset)) => match rest.first() {
                    None => {
                        let otherwise = self.parse_else_body(else_offset)?;
                        return Ok(Node::If {
                            branches,
                            otherwise,
                        });
                    }
                    Some(Token::Ident(keyword)) if keyword == "if" => {
                        condition = parse_pipeline(&rest[1..], else_offset)?;
                    }
                    Some(_) => {
                        return Err(TemplateError::parse(else_offset, "unexpected tokens after else"));
                    }
                },
                None => return Err(TemplateError::parse(offset, "unexpected EOF in if")),
            }
        }
    }

    fn parse_range(&mut self, source: &[Token], offset: usize) -> TemplateResult<Node> {
        let pipeline = parse_pipeline(source, offset)?;
        let (body, terminator) = self.parse_list()?;
        let otherwise = match terminator {
            Some(Terminator::End) => Vec::new(),
            Some(Terminator::Else(rest, else_offset)) if rest.is_empty() => {
                self.parse_else_body(else_offset)?
            }
            Some(Terminator::Else(_, else_offset)) => {
                return Err(TemplateError::parse(else_offset, "unexpected tokens after else"));
            }
            None => return Err(TemplateError::parse(offset, "unexpected EOF in range")),
        };
        Ok(Node::Range {
            pipeline,
            body,
            otherwise,
        })
    }

    fn parse_else_body(&mut self, offset: usize) -> TemplateResult<Vec<Node>> {
        match self.parse_list()? {
            (body, Some(Terminator::End)) => Ok(body),
            (_, Some(Terminator::Else(_, else_offset))) => {
                Err(TemplateError::parse(else_offset, "unexpected {{else}} after {{else}}"))
            }
            (_, None) => Err(TemplateError::parse(offset, "unexpected EOF in else")),
        }
    }
}

fn parse_pipeline(tokens: &[Token], offset: usize) -> TemplateResult<Pipeline> {
    let mut commands = Vec::new();
    let mut args = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Pipe => {
                if args.is_empty() {
                    return Err(TemplateError::parse(offset, "missing command before |"));
                }
                commands.push(Command {
                    args: std::mem::take(&mut args),
                });
            }
            Token::LParen => {
                let close = matching_paren(tokens, i)
                    .ok_or_else(|| TemplateError::parse(offset, "unclosed left paren"))?;
                args.push(Operand::Nested(parse_pipeline(&tokens[i + 1..close], offset)?));
                i = close;
            }
            Token::RParen => return Err(TemplateError::parse(offset, "unexpected right paren")),
            Token::Dot => args.push(Operand::Dot),
            Token::Field(path) => args.push(Operand::Field(path.clone())),
            Token::Literal(value) => args.push(Operand::Literal(value.clone())),
            Token::Ident(name) => args.push(Operand::Function(name.clone())),
        }
        i += 1;
    }

    if args.is_empty() {
        return Err(TemplateError::parse(offset, "missing value for command"));
    }
    commands.push(Command { args });
    Ok(Pipeline { commands })
}

fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_field() {
        let nodes = parse("hi {{.user}}!").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(
            nodes[1],
            Node::Action(Pipeline {
                commands: vec![Command {
                    args: vec![Operand::Field(vec!["user".to_string()])]
                }]
            })
        );
    }

    #[test]
    fn test_trim_markers() {
        let nodes = parse("a  {{- .x -}}  b").unwrap();
        assert_eq!(nodes.first(), Some(&Node::Text("a".to_string())));
        assert_eq!(nodes.last(), Some(&Node::Text("b".to_string())));
    }

    #[test]
    fn test_comment_is_dropped() {
        assert_eq!(parse("{{/* nothing */}}x").unwrap(), vec![Node::Text("x".to_string())]);
    }

    #[test]
    fn test_braces_inside_string() {
        assert!(parse(r#"{{eq .x "}}"}}"#).is_ok());
    }

    #[test]
    fn test_if_else_chain() {
        let nodes = parse("{{if .a}}A{{else if .b}}B{{else}}C{{end}}").unwrap();
        match &nodes[0] {
            Node::If { branches, otherwise } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(otherwise, &vec![Node::Text("C".to_string())]);
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_errors() {
        assert!(parse("{{if .a}}x").is_err());
        assert!(parse("{{end}}").is_err());
        assert!(parse("{{.a").is_err());
        assert!(parse("{{}}").is_err());
        assert!(parse("{{ (eq .a 1 }}").is_err());
        assert!(parse(r#"{{"open}}"#).is_err());
    }

    #[test]
    fn test_numbers() {
        let nodes = parse("{{-3}}{{1.5}}").unwrap();
        assert_eq!(
            nodes[0],
            Node::Action(Pipeline {
                commands: vec![Command {
                    args: vec![Operand::Literal(Value::Int(-3))]
                }]
            })
        );
    }
}
