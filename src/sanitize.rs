//! Query sanitizing for the search engine's `query_string` syntax.
//!
//! Power users may prefix or suffix a term with a single operator
//! (`+must`, `-not`, `wild*`, `!neg`); everything else is escaped so a
//! release name full of punctuation can never produce a malformed query.

use once_cell::sync::Lazy;
use regex::Regex;

const PREFIX_OPERATORS: [char; 5] = ['!', '+', '-', '?', '*'];
const SUFFIX_OPERATORS: [char; 4] = ['+', '-', '?', '*'];

static OPERATOR_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[!+?\-*]{2,}").expect("operator run regex"));

/// Input accepted by [`sanitize`]: one phrase or an ordered list of them.
pub enum Phrases<'a> {
    One(&'a str),
    Many(Vec<&'a str>),
}

impl<'a> From<&'a str> for Phrases<'a> {
    fn from(s: &'a str) -> Self {
        Phrases::One(s)
    }
}

impl<'a> From<&'a String> for Phrases<'a> {
    fn from(s: &'a String) -> Self {
        Phrases::One(s.as_str())
    }
}

impl<'a, S: AsRef<str>> From<&'a [S]> for Phrases<'a> {
    fn from(items: &'a [S]) -> Self {
        Phrases::Many(items.iter().map(|s| s.as_ref()).collect())
    }
}

impl<'a, S: AsRef<str>> From<&'a Vec<S>> for Phrases<'a> {
    fn from(items: &'a Vec<S>) -> Self {
        Phrases::Many(items.iter().map(|s| s.as_ref()).collect())
    }
}

/// Turn user phrases into a safe query string.
///
/// A single string is split on periods and whitespace; a list is split on
/// whitespace only. Tokens are re-joined with single spaces.
pub fn sanitize<'a>(phrases: impl Into<Phrases<'a>>) -> String {
    let phrases = match phrases.into() {
        Phrases::One(s) => vec![s.replace('.', " ")],
        Phrases::Many(list) => list.into_iter().map(str::to_string).collect(),
    };

    phrases
        .iter()
        .flat_map(|p| p.split_whitespace())
        .map(|token| {
            if is_operator_term(token) {
                token.to_string()
            } else {
                escape(token)
            }
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A token keeps its operator when it has exactly one leading or trailing
/// operator character and no run of two or more.
fn is_operator_term(token: &str) -> bool {
    if token.chars().count() <= 1 || OPERATOR_RUN.is_match(token) {
        return false;
    }
    token.starts_with(PREFIX_OPERATORS) || token.ends_with(SUFFIX_OPERATORS)
}

/// Escape reserved characters. `<` and `>` cannot be escaped in
/// `query_string` and are dropped.
pub fn escape(term: &str) -> String {
    let mut out = String::with_capacity(term.len() * 2);
    for c in term.chars() {
        match c {
            '<' | '>' => {}
            '+' | '-' | '=' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"'
            | '~' | '*' | '?' | ':' | '\\' | '/' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_pass_through() {
        assert_eq!(sanitize("foo bar"), "foo bar");
    }

    #[test]
    fn single_operator_terms_are_kept() {
        assert_eq!(sanitize("+required -excluded"), "+required -excluded");
        assert_eq!(sanitize("matri* !cam"), "matri* !cam");
    }

    #[test]
    fn embedded_operator_is_escaped() {
        assert_eq!(sanitize("a+b"), "a\\+b");
    }

    #[test]
    fn operator_runs_are_escaped() {
        assert_eq!(sanitize("--rm"), "\\-\\-rm");
        assert_eq!(sanitize("what??"), "what\\?\\?");
    }

    #[test]
    fn lone_operator_is_escaped() {
        assert_eq!(sanitize("-"), "\\-");
    }

    #[test]
    fn periods_split_single_strings() {
        assert_eq!(sanitize("Some.Movie.2010"), "Some Movie 2010");
    }

    #[test]
    fn list_input_is_not_split_on_periods() {
        let phrases = vec!["dr.who", "x y"];
        assert_eq!(sanitize(&phrases), "dr.who x y");
    }

    #[test]
    fn reserved_characters_are_neutralized() {
        assert_eq!(sanitize("(a:b)"), "\\(a\\:b\\)");
        assert_eq!(sanitize("x<y>z"), "xyz");
        assert_eq!(sanitize("a/b\\c"), "a\\/b\\\\c");
    }

    #[test]
    fn empty_input_yields_empty_query() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   "), "");
        let none: Vec<&str> = Vec::new();
        assert_eq!(sanitize(&none), "");
    }

    #[test]
    fn no_unescaped_reserved_character_survives() {
        let inputs = ["a&&b", "x||y", "t~1", "q^2", "{r}", "[s]", "\"quoted\"", "k=v"];
        for input in inputs {
            let out = sanitize(input);
            let mut prev = ' ';
            for c in out.chars() {
                if "&|~^{}[]\"=".contains(c) {
                    assert_eq!(prev, '\\', "unescaped {} in {}", c, out);
                }
                prev = c;
            }
        }
    }
}
