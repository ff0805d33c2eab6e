//! Glob Pattern Module
//!
//! Translates `*` wildcard patterns into anchored regular expressions. The
//! same translation prunes L1 that the backing store uses for `KEYS`, so both
//! tiers agree on which keys a pattern covers.

use regex::Regex;

/// A `*` glob compiled to an anchored regex.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles `pattern`. Every `*` becomes `.*`; all other characters match
    /// literally.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        Self::compile(pattern, &body)
    }

    /// Compiles a pattern written in `KEYS` syntax, as produced by
    /// [`GlobPattern::to_store_glob`]: a backslash makes the next character
    /// literal.
    pub fn from_store_glob(glob: &str) -> Result<Self, regex::Error> {
        let mut body = String::with_capacity(glob.len() * 2);
        let mut source = String::with_capacity(glob.len());
        let mut chars = glob.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        body.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                        source.push(escaped);
                    }
                }
                '*' => {
                    body.push_str(".*");
                    source.push('*');
                }
                other => {
                    body.push_str(&regex::escape(other.encode_utf8(&mut [0; 4])));
                    source.push(other);
                }
            }
        }
        Self::compile(&source, &body)
    }

    fn compile(source: &str, body: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("(?s)^{body}$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Returns true if `key` is covered by the pattern.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// The original glob text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The pattern in `KEYS` syntax: `*` stays a wildcard, while `?`, `[`,
    /// `]` and `\` are escaped so the store matches them literally.
    pub fn to_store_glob(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        for c in self.source.chars() {
            if matches!(c, '?' | '[' | ']' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }
}
