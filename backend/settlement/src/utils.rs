use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Trims and collapses every whitespace run (tabs, newlines included) into a
/// single space. Case and punctuation are kept since they are shown to users.
pub fn normalize(input: &str) -> String {
    WHITESPACE.replace_all(input.trim(), " ").into_owned()
}

/// Same as [`normalize`], but keeps line breaks between paragraphs.
pub fn normalize_paragraphs(input: &str) -> String {
    input
        .lines()
        .map(normalize)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lookup key for an email address. Every store matches callers on this.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{normalize, normalize_email, normalize_paragraphs};

    #[test]
    fn test_basic() {
        assert_eq!(normalize("Will it rain?"), "Will it rain?");
        assert_eq!(normalize("Will  it\train"), "Will it rain");
    }

    #[test]
    fn test_leading_trailing_spaces() {
        assert_eq!(normalize("   hello   "), "hello");
        assert_eq!(normalize("  multiple   spaces  "), "multiple spaces");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  \n\t "), "");
    }

    #[test]
    fn test_paragraphs() {
        assert_eq!(
            normalize_paragraphs("  first   line \n\n second\tline  "),
            "first line\nsecond line"
        );
    }

    #[test]
    fn test_email_key() {
        assert_eq!(normalize_email(" Member2@Campus.EDU "), "member2@campus.edu");
        assert_eq!(normalize_email("ÉLÈVE@campus.edu"), "élève@campus.edu");
    }
}
