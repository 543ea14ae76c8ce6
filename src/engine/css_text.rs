//! Rule text handling for [`MemoryDocument`](super::MemoryDocument).
//!
//! This is not a CSS parser. It splits text into rules along block
//! boundaries, splits bodies into `name: value` pairs, and canonicalises
//! selector text the way browser engines do on read-back (escapes normalized,
//! combinators and commas spaced). Values are kept as opaque text.

use cssparser::{ParseError, ParseErrorKind, Parser, ParserInput, ToCss, Token};

use crate::engine::CssRuleKind;

/// One `name: value` pair from a rule body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedDeclaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

impl ParsedDeclaration {
    fn from_text(text: &str) -> Option<Self> {
        let (name, value) = text.split_once(':')?;
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return None;
        }
        let value = value.trim();
        let (value, important) = split_important(value);
        if value.is_empty() {
            return None;
        }
        Some(Self {
            name,
            value: value.to_string(),
            important,
        })
    }
}

/// A rule recovered from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedRule {
    pub kind: CssRuleKind,
    /// Canonical selector for style rules, prelude for everything else.
    pub header: String,
    /// Name of a keyframes rule.
    pub name: Option<String>,
    pub declarations: Vec<ParsedDeclaration>,
    pub children: Vec<ParsedRule>,
    /// `true` for `;`-terminated at-statements such as `@import`.
    pub statement: bool,
}

impl ParsedRule {
    fn statement(text: String) -> Self {
        Self {
            kind: CssRuleKind::Other,
            header: text,
            name: None,
            declarations: Vec::new(),
            children: Vec::new(),
            statement: true,
        }
    }
}

/// Strips a trailing `!important` flag from a value.
pub(crate) fn split_important(value: &str) -> (&str, bool) {
    let trimmed = value.trim_end();
    let lower = trimmed.to_ascii_lowercase();
    if let Some(pos) = lower.rfind('!') {
        if lower[pos + 1..].trim() == "important" {
            return (trimmed[..pos].trim_end(), true);
        }
    }
    (trimmed, false)
}

/// Splits text into top-level rules.
pub(crate) fn parse_rule_list(text: &str) -> Result<Vec<ParsedRule>, String> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    parse_rules(&mut parser, false)
}

/// Parses text that must hold exactly one rule.
///
/// Inside a keyframes block, bare preludes are frame steps, not selectors.
pub(crate) fn parse_single_rule(text: &str, in_keyframes: bool) -> Result<ParsedRule, String> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    let mut rules = parse_rules(&mut parser, in_keyframes)?;
    match rules.len() {
        1 => Ok(rules.remove(0)),
        0 => Err("no rule found".to_string()),
        n => Err(format!("expected a single rule, found {}", n)),
    }
}

enum Step<'i> {
    Token(Token<'i>),
    End,
}

fn next_step<'i>(parser: &mut Parser<'i, '_>) -> Step<'i> {
    match parser.next_including_whitespace_and_comments() {
        Ok(token) => Step::Token(token.clone()),
        Err(_) => Step::End,
    }
}

fn skip_trivia(parser: &mut Parser<'_, '_>) {
    loop {
        let state = parser.state();
        match next_step(parser) {
            Step::Token(Token::WhiteSpace(_))
            | Step::Token(Token::Comment(_))
            | Step::Token(Token::CDO)
            | Step::Token(Token::CDC) => {}
            _ => {
                parser.reset(&state);
                return;
            }
        }
    }
}

fn describe(err: ParseError<'_, String>) -> String {
    match err.kind {
        ParseErrorKind::Custom(message) => message,
        ParseErrorKind::Basic(basic) => format!("{:?}", basic),
    }
}

fn parse_rules<'i>(parser: &mut Parser<'i, '_>, in_keyframes: bool) -> Result<Vec<ParsedRule>, String> {
    let mut rules = Vec::new();
    loop {
        skip_trivia(parser);
        if parser.is_exhausted() {
            return Ok(rules);
        }

        let start = parser.position();
        let mut at_name: Option<String> = None;
        let mut first = true;
        loop {
            let before = parser.position();
            let token = match next_step(parser) {
                Step::Token(token) => token,
                Step::End => {
                    return Err(format!(
                        "rule \"{}\" has no body",
                        parser.slice_from(start).trim()
                    ))
                }
            };
            match token {
                Token::AtKeyword(ref name) if first => {
                    at_name = Some(name.to_ascii_lowercase());
                }
                Token::Semicolon => {
                    let prelude = parser.slice(start..before).trim().to_string();
                    if at_name.is_none() {
                        return Err(format!("unexpected \";\" after \"{}\"", prelude));
                    }
                    rules.push(ParsedRule::statement(format!("{};", prelude)));
                    break;
                }
                Token::CurlyBracketBlock => {
                    let prelude = parser.slice(start..before).trim().to_string();
                    let rule = parse_block(parser, prelude, at_name.take(), in_keyframes)?;
                    rules.push(rule);
                    break;
                }
                Token::CloseCurlyBracket => return Err("unexpected \"}\"".to_string()),
                _ => {}
            }
            first = false;
        }
    }
}

fn parse_block<'i>(
    parser: &mut Parser<'i, '_>,
    prelude: String,
    at_name: Option<String>,
    in_keyframes: bool,
) -> Result<ParsedRule, String> {
    let mut rule = ParsedRule {
        kind: CssRuleKind::Other,
        header: prelude,
        name: None,
        declarations: Vec::new(),
        children: Vec::new(),
        statement: false,
    };

    match at_name.as_deref() {
        Some(name) if name == "keyframes" || name.ends_with("-keyframes") => {
            let keyframes_name = rule.header[name.len() + 1..].trim().to_string();
            if keyframes_name.is_empty() {
                return Err("keyframes rule without a name".to_string());
            }
            rule.kind = CssRuleKind::Keyframes;
            rule.header = format!("@{} {}", name, keyframes_name);
            rule.name = Some(keyframes_name);
            rule.children = parse_nested_rules(parser, true)?;
        }
        Some("media" | "supports" | "container" | "layer" | "document") => {
            rule.kind = CssRuleKind::Grouping;
            rule.header = collapse_whitespace(&rule.header);
            rule.children = parse_nested_rules(parser, false)?;
        }
        Some(_) => {
            rule.header = collapse_whitespace(&rule.header);
            rule.declarations = parse_nested_declarations(parser);
        }
        None if in_keyframes => {
            rule.header = collapse_whitespace(&rule.header);
            rule.declarations = parse_nested_declarations(parser);
        }
        None => {
            let selector = canonical_selector(&rule.header)
                .ok_or_else(|| format!("invalid selector \"{}\"", rule.header))?;
            rule.kind = CssRuleKind::Style;
            rule.header = selector;
            rule.declarations = parse_nested_declarations(parser);
        }
    }
    Ok(rule)
}

fn parse_nested_rules<'i>(
    parser: &mut Parser<'i, '_>,
    in_keyframes: bool,
) -> Result<Vec<ParsedRule>, String> {
    parser
        .parse_nested_block(|nested| -> Result<Vec<ParsedRule>, ParseError<'i, String>> {
            match parse_rules(nested, in_keyframes) {
                Ok(rules) => Ok(rules),
                Err(message) => Err(nested.new_custom_error(message)),
            }
        })
        .map_err(describe)
}

fn parse_nested_declarations<'i>(parser: &mut Parser<'i, '_>) -> Vec<ParsedDeclaration> {
    parser
        .parse_nested_block(
            |nested| -> Result<Vec<ParsedDeclaration>, ParseError<'i, ()>> {
                Ok(parse_declarations(nested))
            },
        )
        .unwrap_or_default()
}

fn parse_declarations(parser: &mut Parser<'_, '_>) -> Vec<ParsedDeclaration> {
    let mut declarations = Vec::new();
    loop {
        let start = parser.position();
        let (end, done) = loop {
            let before = parser.position();
            match next_step(parser) {
                Step::Token(Token::Semicolon) => break (before, false),
                Step::Token(_) => {}
                Step::End => break (parser.position(), true),
            }
        };
        if let Some(declaration) = ParsedDeclaration::from_text(parser.slice(start..end)) {
            declarations.push(declaration);
        }
        if done {
            return declarations;
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of a selector, as an engine would report it on read-back.
///
/// Returns `None` for text that cannot be a selector.
pub(crate) fn canonical_selector(text: &str) -> Option<String> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    let mut out = String::new();
    if !serialize_tokens(&mut parser, &mut out) {
        return None;
    }
    let out = out.trim().to_string();
    if out.is_empty() || out.starts_with(',') || out.ends_with(',') {
        return None;
    }
    Some(out)
}

fn trim_trailing_space(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
}

fn serialize_tokens<'i>(parser: &mut Parser<'i, '_>, out: &mut String) -> bool {
    loop {
        let token = match next_step(parser) {
            Step::Token(token) => token,
            Step::End => return true,
        };
        let closing = match token {
            Token::Function(_) | Token::ParenthesisBlock => Some(')'),
            Token::SquareBracketBlock => Some(']'),
            _ => None,
        };
        match token {
            Token::Comment(_) => {}
            Token::WhiteSpace(_) => {
                if !out.is_empty() && !out.ends_with([' ', '(', '[']) {
                    out.push(' ');
                }
            }
            Token::Delim(c) if matches!(c, '>' | '+' | '~') => {
                trim_trailing_space(out);
                out.push(' ');
                out.push(c);
                out.push(' ');
            }
            Token::Comma => {
                trim_trailing_space(out);
                out.push_str(", ");
            }
            Token::CurlyBracketBlock
            | Token::CloseCurlyBracket
            | Token::Semicolon
            | Token::BadString(_)
            | Token::BadUrl(_)
            | Token::AtKeyword(_) => return false,
            ref other => out.push_str(&other.to_css_string()),
        }
        if let Some(close) = closing {
            let valid = parser
                .parse_nested_block(|nested| -> Result<bool, ParseError<'i, ()>> {
                    Ok(serialize_tokens(nested, out))
                })
                .unwrap_or(false);
            if !valid {
                return false;
            }
            trim_trailing_space(out);
            out.push(close);
        }
    }
}
