//! Stream selection rules given to the viewer on the command line.
//!
//! A token is `[+|-]body`, where `...` inside the body matches any text and
//! everything else matches literally, without regard to case. Rules are
//! checked in the order given and the first match decides. Streams no rule
//! matches are shown only if no include rule was given at all.

use crate::format::{BRIGHT_RED, colorize};
use crate::registry::ROOT_STREAM_NAME;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use tracing::warn;

static WILDCARD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{3,}").unwrap());

const PATTERN_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
enum Pattern {
    Regex(Regex),
    /// Body that failed to compile, compared as plain text.
    Literal(String),
}

impl Pattern {
    fn is_match(&self, name: &str) -> bool {
        match self {
            Pattern::Regex(re) => re.is_match(name),
            Pattern::Literal(body) => body.eq_ignore_ascii_case(name),
        }
    }
}

/// One include/exclude rule.
#[derive(Debug, Clone)]
pub struct DirectiveRule {
    pattern: Pattern,
    include: bool,
    source_order: usize,
    token: String,
}

impl DirectiveRule {
    pub fn include(&self) -> bool {
        self.include
    }

    pub fn source_order(&self) -> usize {
        self.source_order
    }

    /// The token as given on the command line, with its sign made explicit.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

/// Compiled selection of streams plus the labels shown for them.
#[derive(Debug, Clone)]
pub struct DirectiveMatcher {
    rules: Vec<DirectiveRule>,
    default_show: bool,
    single: Option<String>,
    tag_all: bool,
}

impl DirectiveMatcher {
    /// Compiles selection tokens. `tag_all` labels lines with full stream
    /// names; otherwise labels drop what the command line already makes obvious.
    pub fn compile<I, S>(tokens: I, tag_all: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::compile_with_limit(tokens, tag_all, PATTERN_SIZE_LIMIT)
    }

    fn compile_with_limit<I, S>(tokens: I, tag_all: bool, size_limit: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = Vec::new();
        let mut include_bodies = Vec::new();

        for token in tokens {
            let token = token.as_ref().trim();
            let (include, body) = match token.as_bytes().first() {
                Some(b'+') => (true, &token[1..]),
                Some(b'-') => (false, &token[1..]),
                _ => (true, token),
            };
            if body.is_empty() {
                warn!(token, "ignoring stream directive without a name");
                continue;
            }
            if include {
                include_bodies.push(body.to_string());
            }
            rules.push(DirectiveRule {
                pattern: compile_pattern(body, size_limit),
                include,
                source_order: rules.len(),
                token: format!("{}{}", if include { '+' } else { '-' }, body),
            });
        }

        let single = match include_bodies.as_slice() {
            [only] if !WILDCARD.is_match(only) => Some(only.to_lowercase()),
            _ => None,
        };

        Self {
            default_show: include_bodies.is_empty(),
            rules,
            single,
            tag_all,
        }
    }

    pub fn rules(&self) -> &[DirectiveRule] {
        &self.rules
    }

    pub fn tag_all(&self) -> bool {
        self.tag_all
    }

    /// Whether the stream with this full name is displayed.
    pub fn matches(&self, name: &str) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.is_match(name))
            .map_or(self.default_show, |rule| rule.include)
    }

    /// Label for a stream's lines; may be empty.
    pub fn display_name(&self, name: &str) -> String {
        if self.tag_all {
            return name.to_string();
        }
        let lower = name.to_lowercase();
        let rest = match &self.single {
            Some(single) if lower == *single => "",
            Some(single) => lower
                .strip_prefix(single.as_str())
                .and_then(|r| r.strip_prefix('.'))
                .unwrap_or(name),
            None => name,
        };
        rest.split('.')
            .enumerate()
            .filter(|(i, seg)| !(*i == 0 && (*seg == ROOT_STREAM_NAME || seg.is_empty())))
            .map(|(_, seg)| seg)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// `"[NAME] "` prefix for a stream's lines, or empty.
    pub fn tag(&self, name: &str, color: bool) -> String {
        let shown = self.display_name(name).to_uppercase();
        if shown.is_empty() {
            String::new()
        } else if color {
            format!("[{}] ", colorize(BRIGHT_RED, &shown))
        } else {
            format!("[{shown}] ")
        }
    }

    /// Summary of the selection, e.g. `[+net...;-net.retry] (+tags)`.
    pub fn title(&self) -> String {
        let selection = if self.rules.is_empty() {
            "ALL STREAMS".to_string()
        } else {
            self.rules
                .iter()
                .map(DirectiveRule::token)
                .collect::<Vec<_>>()
                .join(";")
        };
        format!("[{selection}] ({}tags)", if self.tag_all { '+' } else { '-' })
    }
}

/// Anchored, case-insensitive pattern where `...` is the only wildcard.
fn compile_pattern(body: &str, size_limit: usize) -> Pattern {
    let expr = WILDCARD
        .split(body)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    match RegexBuilder::new(&format!("^{expr}$"))
        .case_insensitive(true)
        .size_limit(size_limit)
        .build()
    {
        Ok(re) => Pattern::Regex(re),
        Err(err) => {
            warn!(body, error = %err, "stream directive treated as a literal name");
            Pattern::Literal(body.to_string())
        }
    }
}
