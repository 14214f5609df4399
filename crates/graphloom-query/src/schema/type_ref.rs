//! Field type references: `Name`, `Name!`, `[Name]`, `[Name!]!`.
//!
//! Parsed with chumsky so malformed references report a position instead
//! of silently degrading to a nullable scalar.

use chumsky::extra;
use chumsky::prelude::*;
use std::fmt;

/// Extra type for parsers - uses Rich errors for better messages
type Extra<'src> = extra::Err<Rich<'src, char>>;

/// A parsed field type reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// Named type (scalar, enum, node, interface or union)
    pub name: String,
    /// `!` on the outermost type
    pub required: bool,
    /// Wrapped in `[...]`
    pub list: bool,
    /// `!` on the list item (`[Name!]`)
    pub items_required: bool,
}

impl TypeRef {
    /// Parse a type reference
    pub fn parse(input: &str) -> Result<Self, String> {
        type_ref_parser()
            .parse(input)
            .into_result()
            .map_err(|errs| format_errors(&errs, input))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list {
            write!(f, "[{}", self.name)?;
            if self.items_required {
                write!(f, "!")?;
            }
            write!(f, "]")?;
        } else {
            write!(f, "{}", self.name)?;
        }
        if self.required {
            write!(f, "!")?;
        }
        Ok(())
    }
}

/// Parser for identifiers: alphanumeric + underscore
fn ident<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_alphanumeric() || *c == '_')
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("type name")
}

/// `Name` or `Name!`
fn named<'src>() -> impl Parser<'src, &'src str, (String, bool), Extra<'src>> + Clone {
    ident()
        .then(just('!').or_not().map(|bang| bang.is_some()))
        .labelled("type like String or String!")
}

fn type_ref_parser<'src>() -> impl Parser<'src, &'src str, TypeRef, Extra<'src>> {
    let list = just('[')
        .padded()
        .ignore_then(named().padded())
        .then_ignore(just(']').padded())
        .then(just('!').or_not().map(|bang| bang.is_some()))
        .map(|((name, items_required), required)| TypeRef {
            name,
            required,
            list: true,
            items_required,
        })
        .labelled("list type like [String!]!");

    let single = named().map(|(name, required)| TypeRef {
        name,
        required,
        list: false,
        items_required: false,
    });

    choice((list, single)).padded().then_ignore(end())
}

/// Format chumsky errors into a single line per error
fn format_errors(errs: &[Rich<'_, char>], input: &str) -> String {
    errs.iter()
        .map(|e| {
            let column = e.span().start + 1;
            let found = e
                .found()
                .map_or("end of input".to_string(), |c| format!("'{}'", c));
            format!(
                "'{}' column {}: {} (found {})",
                input,
                column,
                e.reason(),
                found
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("String", "String", false, false, false; "nullable scalar")]
    #[test_case("Int!", "Int", true, false, false; "required scalar")]
    #[test_case("[Movie]", "Movie", false, true, false; "nullable list")]
    #[test_case("[Movie!]!", "Movie", true, true, true; "required list of required")]
    #[test_case(" [ Tag ]! ", "Tag", true, true, false; "padded")]
    fn test_parse_type_ref(input: &str, name: &str, required: bool, list: bool, items: bool) {
        let parsed = TypeRef::parse(input).unwrap();
        assert_eq!(parsed.name, name);
        assert_eq!(parsed.required, required);
        assert_eq!(parsed.list, list);
        assert_eq!(parsed.items_required, items);
    }

    #[test_case("" ; "empty")]
    #[test_case("[Movie" ; "unclosed list")]
    #[test_case("[[Int]]" ; "nested list")]
    #[test_case("Movie!!" ; "double bang")]
    fn test_parse_type_ref_rejects(input: &str) {
        assert!(TypeRef::parse(input).is_err());
    }

    #[test]
    fn test_display_roundtrips() {
        for input in ["String", "Int!", "[Movie]", "[Movie!]!", "[Tag]!"] {
            assert_eq!(TypeRef::parse(input).unwrap().to_string(), input);
        }
    }
}
