//! Name and filename sanitization

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

/// Tokens shorter than this are dropped (keeps particles like `DA`, `DE`)
pub const MIN_TOKEN_CHARS: usize = 2;
/// A name needs at least this many surviving tokens
pub const MIN_NAME_TOKENS: usize = 2;
/// Names are cut to this many tokens
pub const MAX_NAME_TOKENS: usize = 6;

/// Stem used when a filename sanitizes to nothing
pub const FILENAME_PLACEHOLDER: &str = "UNNAMED";

lazy_static! {
    /// Field labels and document-id abbreviations that leak into captures
    static ref STOPWORDS: HashSet<&'static str> = [
        "CARGO",
        "ENDERECO",
        "ENDEREÇO",
        "ATIVIDADE",
        "EMPREGADOR",
        "CIDADE",
        "RUA",
        "ASSINATURA",
        "CTPS",
        "CNPS",
        "CNPJ",
        "CGC",
    ]
    .into_iter()
    .collect();

    static ref ILLEGAL_FILENAME_CHARS: Regex = Regex::new(r#"[\\/:*?"<>|]"#).unwrap();

    static ref NON_WORD_RUNS: Regex = Regex::new(r"\W+").unwrap();
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_uppercase() || ('\u{C0}'..='\u{DD}').contains(&c) || c == ' '
}

/// Returns true if `token` is a known field label rather than part of a name
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Reduce a captured candidate to a plausible person name.
///
/// Characters outside `A-Z`, `À-Ý` and space become spaces. Tokens shorter than
/// [`MIN_TOKEN_CHARS`] and stopwords are dropped; fewer than
/// [`MIN_NAME_TOKENS`] survivors rejects the candidate. At most
/// [`MAX_NAME_TOKENS`] tokens are kept.
pub fn sanitize_name_tokens(name: Option<&str>) -> Option<String> {
    let name = name?;
    let filtered: String = name
        .chars()
        .map(|c| if is_name_char(c) { c } else { ' ' })
        .collect();

    let tokens: Vec<&str> = filtered
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !is_stopword(t))
        .collect();

    if tokens.len() < MIN_NAME_TOKENS {
        return None;
    }

    Some(
        tokens
            .into_iter()
            .take(MAX_NAME_TOKENS)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Strip characters that are illegal in file paths and collapse whitespace.
///
/// Never returns an empty string.
pub fn sanitize_filename(s: &str) -> String {
    let replaced = ILLEGAL_FILENAME_CHARS.replace_all(s, " ");
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        FILENAME_PLACEHOLDER.to_string()
    } else {
        collapsed
    }
}

/// Identifier safe for DOM ids and URLs: non-word runs become `_`
pub fn safe_identifier(display_name: &str) -> String {
    NON_WORD_RUNS.replace_all(display_name, "_").into_owned()
}
