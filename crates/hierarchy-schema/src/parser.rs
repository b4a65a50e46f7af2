//! Access-path parser implementation using nom.
//!
//! Grammar:
//!
//! ```text
//! path        := name step*
//! step        := "." name
//!              | "[[" [identifier ("," identifier)*] "]]"
//!              | "[" identifier "]"
//!              | "[" quoted-name ("," quoted-name)* "]"
//! identifier  := integer | '"' chars '"'
//! quoted-name := "'" name "'"
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult,
};

use crate::access::{AccessPath, AccessStep};
use crate::error::{ParseError, ParseResult};
use crate::value::Identifier;

/// Parse an access path string.
///
/// # Examples
///
/// ```rust
/// use hierarchy_schema::{parse, AccessStep};
///
/// // Plural hop and table read
/// let path = parse("ob.exposures['mjd']").unwrap();
/// assert_eq!(path.steps.len(), 3);
///
/// // Explicit identifier at the root
/// let path = parse("run[1002].ob").unwrap();
/// assert!(matches!(path.steps[1], AccessStep::Identifier(_)));
///
/// // Identifier list, duplicates kept
/// let path = parse("runs[[1, 2, 2, 99]]").unwrap();
/// assert!(matches!(&path.steps[1], AccessStep::Identifiers(ids) if ids.len() == 4));
/// ```
pub fn parse(input: &str) -> ParseResult<AccessPath> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::EmptyPath);
    }

    match all_consuming(access_path)(input) {
        Ok((_, path)) => Ok(path),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = input.len() - e.input.len();
            Err(ParseError::Syntax {
                position,
                message: format!("unexpected input at: '{}'", truncate(e.input, 20)),
            })
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::Incomplete("access path".to_string())),
    }
}

fn truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn access_path(input: &str) -> IResult<&str, AccessPath> {
    let (input, first) = delimited(ws, name, ws)(input)?;
    let (input, rest) = many0(delimited(ws, step, ws))(input)?;

    let mut steps = Vec::with_capacity(rest.len() + 1);
    steps.push(AccessStep::Attribute(first.to_string()));
    steps.extend(rest);
    Ok((input, AccessPath::new(steps)))
}

fn step(input: &str) -> IResult<&str, AccessStep> {
    alt((attribute, identifier_list, single_identifier, columns))(input)
}

fn attribute(input: &str) -> IResult<&str, AccessStep> {
    map(preceded(pair(char('.'), ws), name), |n: &str| {
        AccessStep::Attribute(n.to_string())
    })(input)
}

fn identifier_list(input: &str) -> IResult<&str, AccessStep> {
    map(
        delimited(
            pair(tag("[["), ws),
            separated_list0(delimited(ws, char(','), ws), identifier),
            pair(ws, tag("]]")),
        ),
        AccessStep::Identifiers,
    )(input)
}

fn single_identifier(input: &str) -> IResult<&str, AccessStep> {
    map(
        delimited(pair(char('['), ws), identifier, pair(ws, char(']'))),
        AccessStep::Identifier,
    )(input)
}

fn columns(input: &str) -> IResult<&str, AccessStep> {
    map(
        delimited(
            pair(char('['), ws),
            separated_list1(delimited(ws, char(','), ws), quoted_name),
            pair(ws, char(']')),
        ),
        |names: Vec<&str>| AccessStep::Columns(names.into_iter().map(String::from).collect()),
    )(input)
}

fn name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn quoted_name(input: &str) -> IResult<&str, &str> {
    delimited(char('\''), name, char('\''))(input)
}

fn identifier(input: &str) -> IResult<&str, Identifier> {
    alt((integer, quoted_identifier))(input)
}

fn integer(input: &str) -> IResult<&str, Identifier> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i64>().map(Identifier::Int)
    })(input)
}

fn quoted_identifier(input: &str) -> IResult<&str, Identifier> {
    map(
        delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
        |s: &str| Identifier::Str(s.to_string()),
    )(input)
}

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str) -> AccessStep {
        AccessStep::Attribute(name.to_string())
    }

    #[test]
    fn test_single_name() {
        let path = parse("runs").unwrap();
        assert_eq!(path.steps, vec![attr("runs")]);
    }

    #[test]
    fn test_attribute_chain() {
        let path = parse("run[1002].exposure.ob").unwrap();
        assert_eq!(
            path.steps,
            vec![
                attr("run"),
                AccessStep::Identifier(Identifier::Int(1002)),
                attr("exposure"),
                attr("ob"),
            ]
        );
    }

    #[test]
    fn test_identifier_list_keeps_order_and_duplicates() {
        let path = parse("runs[[3, 1, 1]]").unwrap();
        assert_eq!(
            path.steps[1],
            AccessStep::Identifiers(vec![3.into(), 1.into(), 1.into()])
        );
    }

    #[test]
    fn test_empty_identifier_list() {
        let path = parse("runs[[]]").unwrap();
        assert_eq!(path.steps[1], AccessStep::Identifiers(vec![]));
    }

    #[test]
    fn test_string_identifiers() {
        let path = parse("surveys[[\"WL\", \"WQ\"]]").unwrap();
        assert_eq!(
            path.steps[1],
            AccessStep::Identifiers(vec!["WL".into(), "WQ".into()])
        );
    }

    #[test]
    fn test_negative_identifier() {
        let path = parse("fibre[-4]").unwrap();
        assert_eq!(path.steps[1], AccessStep::Identifier(Identifier::Int(-4)));
    }

    #[test]
    fn test_columns() {
        let path = parse("ob.exposures['mjd', 'expid']").unwrap();
        assert_eq!(
            path.steps[2],
            AccessStep::Columns(vec!["mjd".to_string(), "expid".to_string()])
        );
    }

    #[test]
    fn test_whitespace_tolerated() {
        let path = parse("  runs [[ 1 , 2 ]] . exposure ").unwrap();
        assert_eq!(path.steps.len(), 3);
    }

    #[test]
    fn test_display_roundtrip_is_canonical() {
        let text = "runs[[1, 2]].exposure['mjd']";
        assert_eq!(parse(text).unwrap().to_string(), text);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse("   "), Err(ParseError::EmptyPath));
    }

    #[test]
    fn test_trailing_garbage() {
        let err = parse("runs.exposure?").unwrap_err();
        match err {
            ParseError::Syntax { position, .. } => assert_eq!(position, 13),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_name_cannot_start_with_digit() {
        assert!(parse("1runs").is_err());
    }

    #[test]
    fn test_unclosed_bracket() {
        assert!(parse("runs[[1, 2]").is_err());
    }
}
