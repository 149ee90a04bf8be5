//! Identifier handling for generated code

use heck::{ToSnakeCase, ToUpperCamelCase};

use crate::GenerateError;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "abstract", "become", "box", "do", "final", "gen", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

// Keywords that cannot be raw identifiers
const UNRAWABLE: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Escape a Rust keyword so it can be used as an identifier.
pub fn escape(ident: &str) -> String {
    if UNRAWABLE.contains(&ident) {
        format!("{}_", ident)
    } else if KEYWORDS.contains(&ident) {
        format!("r#{}", ident)
    } else {
        ident.to_string()
    }
}

/// Reject IDL names that are not valid identifiers.
pub fn check(kind: &'static str, name: &str) -> Result<(), GenerateError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GenerateError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}

/// Struct, enum and trait names keep their IDL spelling.
pub fn type_ident(name: &str) -> String {
    escape(name)
}

/// Fields, params and methods become snake_case.
pub fn value_ident(name: &str) -> String {
    let snake = name.to_snake_case();
    if snake.is_empty() {
        escape(name)
    } else {
        escape(&snake)
    }
}

/// Enum values become UpperCamelCase variants.
pub fn variant_ident(value: &str) -> String {
    let camel = value.to_upper_camel_case();
    match camel.chars().next() {
        None => "Empty".to_string(),
        Some(c) if c.is_ascii_digit() => format!("V{}", camel),
        Some(_) => escape(&camel),
    }
}

/// Disambiguate names that collide after case conversion by appending a
/// counter.
pub fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}{}", name, n);
                n += 1;
            }
            candidate
        })
        .collect()
}
