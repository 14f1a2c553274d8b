//! Parsers - literal classification, text templates, declarations.
//!
//! - [`parse_type`] - is a token a literal or a keypath?
//! - [`parse_template`] - split text into literal and binding segments
//! - [`split_declaration`] - `keypath | formatter args | ...`
//! - [`formatter_args`] - `name arg 'quoted arg' ...`
//!
//! All of them are pure functions over `&str`; none of them fail. Anything
//! that is not a literal is a keypath, and text without delimiters has no
//! segments.

use crate::value::Value;

// =============================================================================
// Literal classification
// =============================================================================

/// Result of [`parse_type`].
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// A literal value written inline.
    Primitive(Value),
    /// Anything else: a path into the model.
    Keypath(String),
}

/// Classify a raw token.
///
/// Quoted strings, `true`, `false`, `null`, `undefined` and numbers are
/// literals. The whole token must match one literal form, otherwise it is a
/// keypath.
///
/// ```
/// use spark_bind::parser::{parse_type, Token};
/// use spark_bind::Value;
///
/// assert_eq!(parse_type("'hi'"), Token::Primitive(Value::from("hi")));
/// assert_eq!(parse_type("42"), Token::Primitive(Value::from(42)));
/// assert_eq!(parse_type("user.name"), Token::Keypath("user.name".into()));
/// ```
pub fn parse_type(raw: &str) -> Token {
    if is_quoted(raw) {
        return Token::Primitive(Value::from(&raw[1..raw.len() - 1]));
    }
    match raw {
        "true" => Token::Primitive(Value::Bool(true)),
        "false" => Token::Primitive(Value::Bool(false)),
        "null" => Token::Primitive(Value::Null),
        "undefined" => Token::Primitive(Value::Undefined),
        _ => match parse_number(raw) {
            Some(n) => Token::Primitive(Value::Number(n)),
            None => Token::Keypath(raw.to_string()),
        },
    }
}

fn is_quoted(raw: &str) -> bool {
    raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')))
}

fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }
    match trimmed {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    // Rust accepts "inf" and "nan"; only exponent markers may be alphabetic
    if trimmed
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

// =============================================================================
// Text templates
// =============================================================================

/// Kind of a template segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Text,
    Binding,
}

/// One piece of a parsed text template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub value: String,
}

impl Segment {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Text,
            value: value.into(),
        }
    }

    pub fn binding(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Binding,
            value: value.into(),
        }
    }
}

/// Split `template` into text and binding segments.
///
/// Returns `None` when the open delimiter never appears. Binding contents are
/// trimmed. An open delimiter with no matching close delimiter is kept, with
/// everything after it, as a trailing text segment.
///
/// ```
/// use spark_bind::parser::{parse_template, Segment};
///
/// assert_eq!(
///     parse_template("a{b}c", ("{", "}")),
///     Some(vec![Segment::text("a"), Segment::binding("b"), Segment::text("c")]),
/// );
/// assert_eq!(
///     parse_template("a{b", ("{", "}")),
///     Some(vec![Segment::text("a"), Segment::text("{b")]),
/// );
/// assert_eq!(parse_template("plain", ("{", "}")), None);
/// ```
pub fn parse_template(template: &str, delimiters: (&str, &str)) -> Option<Vec<Segment>> {
    let (open, close) = delimiters;
    if open.is_empty() || close.is_empty() {
        return None;
    }

    let mut segments: Option<Vec<Segment>> = None;
    let mut last = 0;

    while last < template.len() {
        let Some(found) = template[last..].find(open).map(|i| i + last) else {
            if let Some(segments) = segments.as_mut() {
                segments.push(Segment::text(&template[last..]));
            }
            break;
        };

        let segments = segments.get_or_insert_with(Vec::new);
        if found > last {
            segments.push(Segment::text(&template[last..found]));
        }

        let start = found + open.len();
        match template[start..].find(close) {
            Some(offset) => {
                let end = start + offset;
                segments.push(Segment::binding(template[start..end].trim()));
                last = end + close.len();
            }
            None => {
                segments.push(Segment::text(&template[found..]));
                break;
            }
        }
    }

    segments
}

// =============================================================================
// Declarations
// =============================================================================

/// Split a binding declaration on `|` into the keypath followed by formatter
/// declarations. Pipes inside single or double quotes do not split. Pieces
/// are trimmed and empty pieces dropped; an empty declaration yields one
/// empty keypath.
///
/// ```
/// use spark_bind::parser::split_declaration;
///
/// assert_eq!(
///     split_declaration("items | join ' | '"),
///     vec!["items".to_string(), "join ' | '".to_string()],
/// );
/// ```
pub fn split_declaration(declaration: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in declaration.chars() {
        match (quote, c) {
            (None, '|') => {
                pieces.push(std::mem::take(&mut current));
                continue;
            }
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            _ => {}
        }
        current.push(c);
    }
    pieces.push(current);

    let pieces: Vec<String> = pieces
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    if pieces.is_empty() {
        vec![String::new()]
    } else {
        pieces
    }
}

/// Tokenize a formatter declaration: whitespace-separated words, where a
/// quoted argument runs until its closing quote is followed by whitespace or
/// the end. Quotes are kept so [`parse_type`] can classify the argument.
///
/// ```
/// use spark_bind::parser::formatter_args;
///
/// assert_eq!(
///     formatter_args("pluralize 'one item' count"),
///     vec!["pluralize", "'one item'", "count"],
/// );
/// ```
pub fn formatter_args(declaration: &str) -> Vec<String> {
    let chars: Vec<char> = declaration.chars().collect();
    let mut args = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        if c == '\'' || c == '"' {
            i += 1;
            while i < chars.len() {
                let closes = chars[i] == c && chars.get(i + 1).is_none_or(|n| n.is_whitespace());
                i += 1;
                if closes {
                    break;
                }
            }
        } else {
            while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '\'' && chars[i] != '"' {
                i += 1;
            }
        }
        args.push(chars[start..i].iter().collect());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // =========================================================================
    // parse_type
    // =========================================================================

    #[test]
    fn test_parse_type_literals() {
        assert_eq!(parse_type("'a b'"), Token::Primitive(Value::from("a b")));
        assert_eq!(parse_type("\"x\""), Token::Primitive(Value::from("x")));
        assert_eq!(parse_type("''"), Token::Primitive(Value::from("")));
        assert_eq!(parse_type("true"), Token::Primitive(Value::Bool(true)));
        assert_eq!(parse_type("false"), Token::Primitive(Value::Bool(false)));
        assert_eq!(parse_type("null"), Token::Primitive(Value::Null));
        assert_eq!(parse_type("undefined"), Token::Primitive(Value::Undefined));
        assert_eq!(parse_type("-1.5"), Token::Primitive(Value::from(-1.5)));
        assert_eq!(parse_type("1e3"), Token::Primitive(Value::from(1000)));
        assert_eq!(parse_type("0x10"), Token::Primitive(Value::from(16)));
    }

    #[test]
    fn test_parse_type_keypaths() {
        for raw in ["user", "user.name", "truely", "'open", "nan", "inf", "1a", "a.0"] {
            assert_eq!(parse_type(raw), Token::Keypath(raw.to_string()), "{raw}");
        }
    }

    // =========================================================================
    // parse_template
    // =========================================================================

    #[test]
    fn test_template_mixed() {
        let segments = parse_template("Hello { user.name }!", ("{", "}"));
        assert_eq!(
            segments,
            Some(vec![
                Segment::text("Hello "),
                Segment::binding("user.name"),
                Segment::text("!"),
            ])
        );
    }

    #[test]
    fn test_template_binding_only() {
        assert_eq!(parse_template("{a}", ("{", "}")), Some(vec![Segment::binding("a")]));
        assert_eq!(
            parse_template("{a}{b}", ("{", "}")),
            Some(vec![Segment::binding("a"), Segment::binding("b")])
        );
    }

    #[test]
    fn test_template_unterminated() {
        assert_eq!(
            parse_template("a{b", ("{", "}")),
            Some(vec![Segment::text("a"), Segment::text("{b")])
        );
        assert_eq!(parse_template("{b", ("{", "}")), Some(vec![Segment::text("{b")]));
        assert_eq!(
            parse_template("{x} and {y", ("{", "}")),
            Some(vec![
                Segment::binding("x"),
                Segment::text(" and "),
                Segment::text("{y"),
            ])
        );
    }

    #[test]
    fn test_template_custom_delimiters() {
        assert_eq!(
            parse_template("a {{ b | upper }} c", ("{{", "}}")),
            Some(vec![
                Segment::text("a "),
                Segment::binding("b | upper"),
                Segment::text(" c"),
            ])
        );
        assert_eq!(parse_template("a { b } c", ("{{", "}}")), None);
    }

    #[test]
    fn test_template_empty() {
        assert_eq!(parse_template("", ("{", "}")), None);
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    #[test]
    fn test_split_declaration() {
        assert_eq!(split_declaration("a"), vec!["a"]);
        assert_eq!(split_declaration(" a | b | c 1 "), vec!["a", "b", "c 1"]);
        assert_eq!(split_declaration("a | f '|' \"|\""), vec!["a", "f '|' \"|\""]);
        assert_eq!(split_declaration(""), vec![""]);
    }

    #[test]
    fn test_formatter_args() {
        assert_eq!(formatter_args("eq 'it''s' x"), vec!["eq", "'it''s'", "x"]);
        assert_eq!(formatter_args("f \"a b\"   2"), vec!["f", "\"a b\"", "2"]);
        assert_eq!(formatter_args("  "), Vec::<String>::new());
        assert_eq!(formatter_args("f 'open"), vec!["f", "'open"]);
    }

    proptest! {
        #[test]
        fn prop_template_without_open_delimiter_has_no_segments(s in "[^{]*") {
            prop_assert_eq!(parse_template(&s, ("{", "}")), None);
        }

        #[test]
        fn prop_template_text_is_never_lost(s in ".*") {
            // Binding contents are trimmed, so compare with whitespace removed
            if let Some(segments) = parse_template(&s, ("{", "}")) {
                let rebuilt: String = segments
                    .iter()
                    .map(|seg| match seg.kind {
                        SegmentKind::Text => seg.value.clone(),
                        SegmentKind::Binding => format!("{{{}}}", seg.value),
                    })
                    .collect();
                let strip = |t: &str| t.chars().filter(|c| !c.is_whitespace()).collect::<String>();
                prop_assert_eq!(strip(&rebuilt), strip(&s));
            }
        }

        #[test]
        fn prop_quote_free_declarations_split_on_pipes(s in "[a-z .|]*") {
            let expected: Vec<String> = s
                .split('|')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            let expected = if expected.is_empty() { vec![String::new()] } else { expected };
            prop_assert_eq!(split_declaration(&s), expected);
        }
    }
}
