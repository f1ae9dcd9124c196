/// Split text on runs of C-locale whitespace and fold every token to ASCII lowercase.
///
/// Only space, tab, newline, vertical tab, form feed and carriage return separate tokens;
/// Unicode spaces such as U+00A0 stay inside a token. No punctuation stripping, no stemming.
pub fn split(text: &str) -> Vec<String> {
    text.split(is_separator).filter(|s| !s.is_empty()).map(fold).collect()
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

/// Lowercase a single token the same way `split` does.
pub fn fold(token: &str) -> String {
    token.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_split() {
        let t = split("London is the Capital");
        assert_eq!(t, vec!["london", "is", "the", "capital"]);
    }

    #[test]
    fn keeps_punctuation() {
        assert_eq!(split("hello, World!"), vec!["hello,", "world!"]);
    }
}
