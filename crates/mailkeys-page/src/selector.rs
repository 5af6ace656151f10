//! A small CSS selector engine covering exactly the subset the element
//! locator emits and the host-control lookups use.
//!
//! Grammar: tag names, `#id`, `.class`, `[attr]`, `[attr="v"]`,
//! `[attr^="v"]`, `[attr*="v"]`, `:nth-of-type(n)`, `:not(<compound>)`,
//! descendant (whitespace) and child (`>`) combinators, and comma-separated
//! lists. Matching agrees with browser `querySelectorAll` semantics for this
//! subset: results in document order, `nth-of-type` counted among same-tag
//! siblings, matching unscoped even for subtree queries.

use std::{iter::Peekable, str::Chars};

use thiserror::Error;

/// Selector parse failure. Callers treat an unparseable selector as a
/// lookup miss, never a fatal error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid selector at byte {at}: {what}")]
pub struct ParseError {
    /// Approximate byte offset of the failure.
    pub at: usize,
    /// What was wrong.
    pub what: String,
}

/// Attribute test operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrOp {
    /// `[attr]`
    Exists,
    /// `[attr="v"]`
    Equals,
    /// `[attr^="v"]`
    Prefix,
    /// `[attr*="v"]`
    Contains,
}

/// One attribute test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrTest {
    /// Attribute name.
    pub name: String,
    /// Operator.
    pub op: AttrOp,
    /// Comparison value; empty for `Exists`.
    pub value: String,
}

/// A compound selector: everything between combinators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    /// Tag name constraint, lowercased.
    pub tag: Option<String>,
    /// `#id` constraint.
    pub id: Option<String>,
    /// `.class` constraints.
    pub classes: Vec<String>,
    /// Attribute tests.
    pub attrs: Vec<AttrTest>,
    /// `:nth-of-type(n)` constraint (1-based).
    pub nth_of_type: Option<usize>,
    /// `:not(...)` negations.
    pub not: Vec<Compound>,
}

impl Compound {
    /// True when no constraint at all was parsed.
    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.nth_of_type.is_none()
            && self.not.is_empty()
    }
}

/// How a compound relates to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Any ancestor distance (whitespace).
    Descendant,
    /// Direct parent (`>`).
    Child,
}

/// A chain of compounds joined by combinators. The first combinator is
/// meaningless and always `Descendant`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complex {
    /// The chain, leftmost first.
    pub parts: Vec<(Combinator, Compound)>,
}

/// A comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    /// The alternatives; an element matches if any complex selector does.
    pub complexes: Vec<Complex>,
}

/// Escape a value for embedding inside `[attr="..."]`.
pub fn escape_attr_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// True when `s` is a plain identifier safe to embed as `#id` or `.class`
/// without escaping.
pub fn is_safe_ident(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Parse a selector string.
pub fn parse(input: &str) -> Result<SelectorList, ParseError> {
    Parser::new(input).parse_list()
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            pos: 0,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next();
        if let Some(c) = ch {
            self.pos += c.len_utf8();
        }
        ch
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn err(&self, what: &str) -> ParseError {
        ParseError {
            at: self.pos,
            what: what.to_string(),
        }
    }

    fn skip_ws(&mut self) -> bool {
        let mut seen = false;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
            seen = true;
        }
        seen
    }

    fn parse_list(&mut self) -> Result<SelectorList, ParseError> {
        let mut complexes = Vec::new();
        loop {
            self.skip_ws();
            complexes.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                None => break,
                Some(c) => return Err(self.err(&format!("unexpected '{}'", c))),
            }
        }
        Ok(SelectorList { complexes })
    }

    fn parse_complex(&mut self) -> Result<Complex, ParseError> {
        let mut parts = vec![(Combinator::Descendant, self.parse_compound()?)];
        loop {
            let ws = self.skip_ws();
            match self.peek() {
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    parts.push((Combinator::Child, self.parse_compound()?));
                }
                Some(c) if ws && c != ',' => {
                    parts.push((Combinator::Descendant, self.parse_compound()?));
                }
                _ => break,
            }
        }
        Ok(Complex { parts })
    }

    fn parse_compound(&mut self) -> Result<Compound, ParseError> {
        let mut out = Compound::default();
        let mut universal = false;
        if matches!(self.peek(), Some(c) if c.is_ascii_alphabetic() || c == '*') {
            if self.peek() == Some('*') {
                self.bump();
                universal = true;
            } else {
                out.tag = Some(self.parse_ident()?.to_lowercase());
            }
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    out.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.bump();
                    let class = self.parse_ident()?;
                    out.classes.push(class);
                }
                Some('[') => {
                    self.bump();
                    out.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.bump();
                    self.parse_pseudo(&mut out)?;
                }
                _ => break,
            }
        }
        if out.is_empty() && !universal {
            return Err(self.err("empty compound selector"));
        }
        Ok(out)
    }

    fn parse_ident(&mut self) -> Result<String, ParseError> {
        let mut out = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            if let Some(c) = self.bump() {
                out.push(c);
            }
        }
        if out.is_empty() {
            return Err(self.err("expected identifier"));
        }
        Ok(out)
    }

    fn parse_attr(&mut self) -> Result<AttrTest, ParseError> {
        self.skip_ws();
        let name = self.parse_ident()?;
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.bump();
                return Ok(AttrTest {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => {
                self.bump();
                AttrOp::Equals
            }
            Some('^') => {
                self.bump();
                self.expect('=')?;
                AttrOp::Prefix
            }
            Some('*') => {
                self.bump();
                self.expect('=')?;
                AttrOp::Contains
            }
            _ => return Err(self.err("expected attribute operator or ']'")),
        };
        self.skip_ws();
        let value = self.parse_quoted()?;
        self.skip_ws();
        self.expect(']')?;
        Ok(AttrTest { name, op, value })
    }

    fn parse_quoted(&mut self) -> Result<String, ParseError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.err("dangling escape")),
                },
                Some(c) => out.push(c),
                None => return Err(self.err("unterminated string")),
            }
        }
    }

    fn parse_pseudo(&mut self, out: &mut Compound) -> Result<(), ParseError> {
        let name = self.parse_ident()?;
        match name.as_str() {
            "nth-of-type" => {
                self.expect('(')?;
                self.skip_ws();
                let mut digits = String::new();
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    if let Some(c) = self.bump() {
                        digits.push(c);
                    }
                }
                self.skip_ws();
                self.expect(')')?;
                let n: usize = digits
                    .parse()
                    .map_err(|_| self.err("expected index in nth-of-type"))?;
                if n == 0 {
                    return Err(self.err("nth-of-type is 1-based"));
                }
                out.nth_of_type = Some(n);
            }
            "not" => {
                self.expect('(')?;
                self.skip_ws();
                let inner = self.parse_compound()?;
                self.skip_ws();
                self.expect(')')?;
                out.not.push(inner);
            }
            other => return Err(self.err(&format!("unsupported pseudo-class :{}", other))),
        }
        Ok(())
    }

    fn expect(&mut self, want: char) -> Result<(), ParseError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.err(&format!("expected '{}'", want))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tag_and_id() {
        let list = parse("button#send").expect("parse");
        assert_eq!(list.complexes.len(), 1);
        let compound = &list.complexes[0].parts[0].1;
        assert_eq!(compound.tag.as_deref(), Some("button"));
        assert_eq!(compound.id.as_deref(), Some("send"));
    }

    #[test]
    fn parses_attribute_operators() {
        let list = parse(r#"button[aria-label^="Snooze"][title*="later"]"#).expect("parse");
        let compound = &list.complexes[0].parts[0].1;
        assert_eq!(compound.attrs.len(), 2);
        assert_eq!(compound.attrs[0].op, AttrOp::Prefix);
        assert_eq!(compound.attrs[1].op, AttrOp::Contains);
    }

    #[test]
    fn parses_escaped_quotes() {
        let list = parse(r#"[aria-label="say \"hi\""]"#).expect("parse");
        assert_eq!(list.complexes[0].parts[0].1.attrs[0].value, "say \"hi\"");
    }

    #[test]
    fn parses_combinators_and_lists() {
        let list = parse("#tools > div span.label, nav [role=\"treeitem\"]").expect("parse");
        assert_eq!(list.complexes.len(), 2);
        let first = &list.complexes[0];
        assert_eq!(first.parts.len(), 3);
        assert_eq!(first.parts[1].0, Combinator::Child);
        assert_eq!(first.parts[2].0, Combinator::Descendant);
    }

    #[test]
    fn parses_pseudo_classes() {
        let list = parse("li.item:nth-of-type(3)").expect("parse");
        assert_eq!(list.complexes[0].parts[0].1.nth_of_type, Some(3));
        let list = parse(r#"[role="menu"]:not([aria-hidden="true"])"#).expect("parse");
        let not = &list.complexes[0].parts[0].1.not;
        assert_eq!(not.len(), 1);
        assert_eq!(not[0].attrs[0].name, "aria-hidden");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("button >").is_err());
        assert!(parse("[unclosed").is_err());
        assert!(parse(":hover").is_err());
        assert!(parse("p:nth-of-type(0)").is_err());
    }

    #[test]
    fn attr_value_escaping_roundtrips() {
        let raw = r#"He said "hi" \ bye"#;
        let sel = format!(r#"[aria-label="{}"]"#, escape_attr_value(raw));
        let list = parse(&sel).expect("parse");
        assert_eq!(list.complexes[0].parts[0].1.attrs[0].value, raw);
    }

    #[test]
    fn safe_ident_screens_out_generated_names() {
        assert!(is_safe_ident("owaSettingsButton"));
        assert!(!is_safe_ident("11000"));
        assert!(!is_safe_ident("a b"));
        assert!(!is_safe_ident(""));
    }
}
