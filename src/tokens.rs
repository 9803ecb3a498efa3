//! Heuristic token-count estimation.
//!
//! Approximates subword tokenizers without loading one: short words are one
//! token, longer words split roughly every four characters, operators and
//! brackets are single tokens, and string literals are costed by length.

/// Operators counted as one token, tried in order. `/*` precedes `/**`, so
/// a doc-comment opener costs two tokens (`/*` then `*`).
const CODE_PATTERNS: &[&str] = &[
    "->", "++", "--", "==", "!=", "<=", ">=", "&&", "||", "<<", ">>", "+=", "-=", "*=", "/=",
    "%=", "^=", "&=", "|=", "::", "//", "/*", "*/", "/**", "{", "}", "[", "]", "(", ")", ";",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenStats {
    pub tokens: usize,
    pub words: usize,
    pub chars: usize,
}

impl TokenStats {
    /// Characters per token, or 0 for empty input.
    #[must_use]
    pub fn chars_per_token(&self) -> f64 {
        if self.tokens == 0 {
            0.0
        } else {
            self.chars as f64 / self.tokens as f64
        }
    }
}

fn code_pattern_at(chars: &[char], pos: usize) -> Option<usize> {
    CODE_PATTERNS.iter().find_map(|pattern| {
        let len = pattern.chars().count();
        let matched = chars.len() >= pos + len
            && pattern.chars().zip(&chars[pos..]).all(|(p, c)| p == *c);
        matched.then_some(len)
    })
}

/// Estimate the token count of `text`.
#[must_use]
pub fn estimate(text: &str) -> TokenStats {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut stats = TokenStats {
        chars: n,
        ..TokenStats::default()
    };

    let mut i = 0;
    while i < n {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if let Some(len) = code_pattern_at(&chars, i) {
            stats.tokens += 1;
            i += len;
            continue;
        }

        if c.is_alphabetic() {
            let start = i;
            while i < n && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let len = i - start;
            stats.words += 1;
            stats.tokens += match len {
                0..=4 => 1,
                5..=8 => 2,
                _ => len.div_ceil(4),
            };
        } else if c.is_ascii_digit() {
            while i < n && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            stats.tokens += 1;
        } else if c == '"' || c == '\'' {
            i += 1;
            stats.tokens += 1;

            let mut content: usize = 0;
            while i < n && chars[i] != c {
                if chars[i] == '\\' && i + 1 < n {
                    i += 2;
                    content += 2;
                } else {
                    i += 1;
                    content += 1;
                }
            }
            stats.tokens += content.div_ceil(4);

            if i < n {
                i += 1;
                stats.tokens += 1;
            }
        } else {
            stats.tokens += 1;
            i += 1;
        }
    }

    stats
}

/// [`estimate`] scaled up for code-like text and down for prose.
#[must_use]
pub fn estimate_advanced(text: &str) -> usize {
    let basic = estimate(text);
    let chars: Vec<char> = text.chars().collect();

    // Brackets and semicolons not glued to a preceding letter.
    let code_indicators = (0..chars.len().saturating_sub(1))
        .filter(|&i| {
            matches!(chars[i], '{' | '}' | ';' | '(' | ')' | '[' | ']')
                && (i == 0 || !chars[i - 1].is_alphabetic())
        })
        .count();

    let mut multiplier = 1.0;
    if code_indicators > basic.words / 10 {
        multiplier = 1.2;
    }
    if code_indicators < basic.words / 20 && basic.words > 10 {
        multiplier = 0.85;
    }

    (basic.tokens as f64 * multiplier) as usize
}

/// Rule of thumb: ~3 characters per token for code, ~4 for prose.
#[must_use]
pub fn quick_estimate(text: &str) -> usize {
    let len = text.chars().count();
    if len == 0 {
        return 0;
    }

    let punct = text.chars().filter(char::is_ascii_punctuation).count();
    if punct > len / 20 {
        len.div_ceil(3)
    } else {
        len.div_ceil(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROSE: &str = "Hello world! This is a simple test sentence.";
    const C_CODE: &str = r#"int main() { printf("Hello\n"); return 0; }"#;

    #[test]
    fn test_estimate_prose() {
        let stats = estimate(PROSE);
        assert_eq!(stats.chars, 44);
        assert_eq!(stats.words, 8);
        assert_eq!(stats.tokens, 14);
    }

    #[test]
    fn test_estimate_code() {
        let stats = estimate(C_CODE);
        assert_eq!(stats.words, 4);
        assert_eq!(stats.tokens, 19);
    }

    #[test]
    fn test_long_word_splits() {
        assert_eq!(estimate("internationalization").tokens, 5);
    }

    #[test]
    fn test_advanced_scales() {
        assert_eq!(estimate_advanced(C_CODE), 22);

        let long_prose = "The quick brown fox jumps over the lazy dog. This is a longer sentence with more complex vocabulary and sophisticated linguistic structures.";
        assert!(estimate_advanced(long_prose) < estimate(long_prose).tokens);
    }

    #[test]
    fn test_quick_estimate() {
        assert_eq!(quick_estimate(""), 0);
        assert_eq!(quick_estimate(PROSE), 11);
        assert_eq!(quick_estimate("a(b);c{d}"), 3);
    }

    #[test]
    fn test_operator_patterns() {
        assert_eq!(estimate("a->b").tokens, 3);
        assert_eq!(estimate("x::y").tokens, 3);
        // `/*` wins over `/**`, leaving a lone `*`
        assert_eq!(estimate("/**").tokens, 2);
        assert_eq!(estimate("/* */").tokens, 2);
    }

    #[test]
    fn test_string_literal_cost() {
        // two quotes plus ceil(8 / 4)
        assert_eq!(estimate(r#""abcdefgh""#).tokens, 4);
        // unterminated: opening quote plus ceil(3 / 4)
        assert_eq!(estimate(r#""abc"#).tokens, 2);
    }

    #[test]
    fn test_empty() {
        assert_eq!(estimate(""), TokenStats::default());
        assert_eq!(estimate("").chars_per_token(), 0.0);
    }
}
