//! Portable filename sanitization for names supplied by the remote source.

/// Fallback when nothing usable survives sanitization.
pub const UNNAMED_FILE: &str = "unnamed_file";

/// Sanitizes a remote display name for use as a local filename.
///
/// - Replaces `< > : " / \ | ? *`, control characters and non-ASCII with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing underscores
/// - Falls back to [`UNNAMED_FILE`] when the result is empty
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
            || c.is_control()
            || !c.is_ascii()
        {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        UNNAMED_FILE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Reduces a search keyword to a filename slug: alphanumerics, `-` and `_` only.
pub fn keyword_slug(keyword: &str) -> String {
    let slug: String = keyword
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if slug.is_empty() {
        "keyword".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_reserved_characters() {
        assert_eq!(sanitize_filename("a/b\\c:d?.txt"), "a_b_c_d_.txt");
    }

    #[test]
    fn collapses_and_trims_underscores() {
        assert_eq!(sanitize_filename("__report***2024__.txt"), "report_2024_.txt");
    }

    #[test]
    fn non_ascii_becomes_underscore() {
        assert_eq!(sanitize_filename("заметки.txt"), ".txt");
        assert_eq!(sanitize_filename("café notes.txt"), "caf_ notes.txt");
    }

    #[test]
    fn empty_falls_back() {
        assert_eq!(sanitize_filename(""), UNNAMED_FILE);
        assert_eq!(sanitize_filename("???"), UNNAMED_FILE);
    }

    #[test]
    fn slug_keeps_word_characters() {
        assert_eq!(keyword_slug("foo bar/baz"), "foobarbaz");
        assert_eq!(keyword_slug("a-b_c"), "a-b_c");
        assert_eq!(keyword_slug("!!"), "keyword");
    }
}
