use regex::Regex;

use crate::error::ConfigurationError;

/// Case-insensitive glob matched against a whole object name.
///
/// `*` matches any run of characters, `?` exactly one, `[abc]` / `[a-z]` one
/// character of a class and `[!abc]` one character outside it. Everything
/// else is literal.
#[derive(Debug, Clone)]
pub struct NamePattern {
    pattern: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        if pattern.trim().is_empty() {
            return Err(invalid("pattern is empty".to_string()));
        }

        let source = glob_to_regex(pattern).map_err(invalid)?;
        let regex = Regex::new(&source).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Compile a list of patterns, failing on the first invalid one
    pub fn compile_all(patterns: &[String]) -> Result<Vec<Self>, ConfigurationError> {
        patterns.iter().map(|p| Self::new(p)).collect()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl std::fmt::Display for NamePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn glob_to_regex(pattern: &str) -> Result<String, String> {
    let mut out = String::from("(?i)^");
    let mut chars = pattern.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' && !class.is_empty() && class != "!" {
                        closed = true;
                        break;
                    }
                    class.push(inner);
                }
                if !closed {
                    return Err("unclosed '[' in character class".to_string());
                }

                out.push('[');
                let body = match class.strip_prefix('!') {
                    Some(rest) => {
                        out.push('^');
                        rest
                    }
                    None => class.as_str(),
                };
                for c in body.chars() {
                    match c {
                        '\\' | '[' | ']' | '^' | '&' | '~' => {
                            out.push('\\');
                            out.push(c);
                        }
                        _ => out.push(c),
                    }
                }
                out.push(']');
            }
            _ => out.push_str(&regex::escape(&ch.to_string())),
        }
    }

    out.push('$');
    Ok(out)
}
