//! Search pattern compilation
//!
//! A pattern written as `/body/flags` is a regular expression; anything else
//! is literal text matched case-insensitively.

use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};

/// Flag letters recognised in the `/body/flags` wrapper
const WRAPPER_FLAGS: &str = "dgimsuvy";

/// Pattern flavor, decided once from the raw pattern text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSpec {
    /// Exact text, case-insensitive
    Literal(String),
    /// Regular expression body with its wrapper flags
    Regex { body: String, flags: String },
}

impl PatternSpec {
    pub fn parse(raw: &str) -> Self {
        if let Some((body, flags)) = split_wrapper(raw) {
            return PatternSpec::Regex {
                body: body.to_string(),
                flags: flags.to_string(),
            };
        }
        PatternSpec::Literal(raw.to_string())
    }

    /// The pattern as the caller wrote it
    fn source_text(&self) -> String {
        match self {
            PatternSpec::Literal(text) => text.clone(),
            PatternSpec::Regex { body, flags } => format!("/{}/{}", body, flags),
        }
    }
}

fn split_wrapper(raw: &str) -> Option<(&str, &str)> {
    let inner = raw.strip_prefix('/')?;
    let slash = inner.rfind('/')?;
    let (body, flags) = (&inner[..slash], &inner[slash + 1..]);
    if body.is_empty() || !flags.chars().all(|c| WRAPPER_FLAGS.contains(c)) {
        return None;
    }
    Some((body, flags))
}

/// A pattern ready to scan pages with. Reused across every page of one search.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    spec: PatternSpec,
    regex: Regex,
    max_match_len: Option<usize>,
}

impl CompiledPattern {
    /// Compile a raw pattern, detecting the `/body/flags` form
    pub fn compile(raw: &str) -> Result<Self> {
        Self::from_spec(PatternSpec::parse(raw))
    }

    pub fn from_spec(spec: PatternSpec) -> Result<Self> {
        let syntax = match &spec {
            PatternSpec::Literal(text) if text.is_empty() => {
                return Err(Error::InvalidPattern {
                    pattern: String::new(),
                    reason: "pattern is empty".to_string(),
                });
            }
            PatternSpec::Literal(text) => Ok(Syntax::literal(text)),
            PatternSpec::Regex { body, flags } => Syntax::wrapped(body, flags),
        };

        let (regex, max_match_len) =
            syntax
                .and_then(|syntax| syntax.build())
                .map_err(|reason| Error::InvalidPattern {
                    pattern: spec.source_text(),
                    reason,
                })?;

        Ok(Self {
            spec,
            regex,
            max_match_len,
        })
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.spec, PatternSpec::Regex { .. })
    }

    pub fn spec(&self) -> &PatternSpec {
        &self.spec
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Longest possible match in bytes, `None` when unbounded (`+`, `*`, ...)
    pub fn max_match_len(&self) -> Option<usize> {
        self.max_match_len
    }
}

/// Expression text plus the options it is compiled with
struct Syntax {
    pattern: String,
    case_insensitive: bool,
    multi_line: bool,
    dot_matches_new_line: bool,
}

impl Syntax {
    fn literal(text: &str) -> Self {
        Self {
            pattern: regex::escape(text),
            case_insensitive: true,
            multi_line: false,
            dot_matches_new_line: false,
        }
    }

    /// Options from wrapper flags.
    ///
    /// Iteration is always global and matching always Unicode-aware, so `g`
    /// and `u` are accepted without effect.
    fn wrapped(body: &str, flags: &str) -> std::result::Result<Self, String> {
        let mut syntax = Self {
            pattern: body.to_string(),
            case_insensitive: false,
            multi_line: false,
            dot_matches_new_line: false,
        };
        let mut seen = String::with_capacity(flags.len());

        for flag in flags.chars() {
            if seen.contains(flag) {
                return Err(format!("duplicate flag '{}'", flag));
            }
            seen.push(flag);

            match flag {
                'g' | 'u' => {}
                'i' => syntax.case_insensitive = true,
                'm' => syntax.multi_line = true,
                's' => syntax.dot_matches_new_line = true,
                other => return Err(format!("unsupported flag '{}'", other)),
            }
        }

        Ok(syntax)
    }

    fn build(self) -> std::result::Result<(Regex, Option<usize>), String> {
        let regex = RegexBuilder::new(&self.pattern)
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
            .build()
            .map_err(|e| e.to_string())?;

        // Parsed with the same options, so the bound holds for `regex`
        let max_match_len = regex_syntax::ParserBuilder::new()
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
            .build()
            .parse(&self.pattern)
            .ok()
            .and_then(|hir| hir.properties().maximum_len());

        Ok((regex, max_match_len))
    }
}
