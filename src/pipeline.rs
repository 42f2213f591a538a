//! Turns the arguments of a log call into the line that gets persisted.
//!
//! Each stream carries [`StreamSettings`]: whether it is enabled (a flag or
//! a predicate), an optional formatter that can rewrite or drop entries, the
//! inspect options of the default formatter and whether a call-site trace is
//! appended. [`render_entry`] applies them in that order.

use crate::format::{InspectOptions, Value, to_debug_string};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

type ArgsFn<T> = Arc<dyn Fn(&[Value]) -> T + Send + Sync>;
type TextFn<T> = Arc<dyn Fn(&str, &[Value]) -> T + Send + Sync>;

/// Decides per call whether an entry is logged.
#[derive(Clone)]
pub enum Predicate {
    /// Sees the raw arguments.
    Args(ArgsFn<bool>),
    /// Sees the default rendering of the arguments, then the arguments.
    WithText(TextFn<bool>),
}

impl Predicate {
    pub fn args<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        Predicate::Args(Arc::new(f))
    }

    pub fn with_text<F>(f: F) -> Self
    where
        F: Fn(&str, &[Value]) -> bool + Send + Sync + 'static,
    {
        Predicate::WithText(Arc::new(f))
    }

    fn test(&self, opts: &InspectOptions, args: &[Value]) -> bool {
        match self {
            Predicate::Args(f) => f(args),
            Predicate::WithText(f) => f(&to_debug_string(opts, args), args),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Args(_) => f.write_str("Predicate::Args"),
            Predicate::WithText(_) => f.write_str("Predicate::WithText"),
        }
    }
}

/// A stream's on/off rule.
#[derive(Debug, Clone)]
pub enum Enabled {
    Always,
    Never,
    When(Predicate),
}

impl From<bool> for Enabled {
    fn from(on: bool) -> Self {
        if on { Enabled::Always } else { Enabled::Never }
    }
}

/// What a formatter hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum Formatted {
    /// Logged verbatim, empty text included.
    Text(String),
    /// Drop the entry.
    Suppress,
    /// Replacement argument list for the default formatter.
    Args(Vec<Value>),
    /// A single value for the default formatter.
    Value(Value),
}

/// Custom entry formatter.
#[derive(Clone)]
pub enum Formatter {
    Args(ArgsFn<Formatted>),
    WithText(TextFn<Formatted>),
}

impl Formatter {
    /// Formatter that only sees the arguments.
    pub fn args<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Formatted + Send + Sync + 'static,
    {
        Formatter::Args(Arc::new(f))
    }

    /// Formatter that also gets the default rendering up front.
    pub fn with_text<F>(f: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Formatted + Send + Sync + 'static,
    {
        Formatter::WithText(Arc::new(f))
    }

    /// Formatter that keeps entries `keep` accepts and drops the rest.
    pub fn filter<F>(keep: F) -> Self
    where
        F: Fn(&[Value]) -> bool + Send + Sync + 'static,
    {
        Formatter::args(move |args| {
            if keep(args) {
                Formatted::Args(args.to_vec())
            } else {
                Formatted::Suppress
            }
        })
    }

    fn apply(&self, opts: &InspectOptions, args: &[Value]) -> Formatted {
        match self {
            Formatter::Args(f) => f(args),
            Formatter::WithText(f) => f(&to_debug_string(opts, args), args),
        }
    }
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formatter::Args(_) => f.write_str("Formatter::Args"),
            Formatter::WithText(_) => f.write_str("Formatter::WithText"),
        }
    }
}

/// Entry-shaping settings of one stream.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub enabled: Enabled,
    pub formatter: Option<Formatter>,
    pub tracing: bool,
    pub inspect: InspectOptions,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            enabled: Enabled::Always,
            formatter: None,
            tracing: false,
            inspect: InspectOptions::default(),
        }
    }
}

/// Runs the enable check, the formatter and the tracer.
///
/// `None` means the entry is suppressed.
pub fn render_entry(
    settings: &StreamSettings,
    args: &[Value],
    caller: Option<&Location<'_>>,
) -> Option<String> {
    let on = match &settings.enabled {
        Enabled::Always => true,
        Enabled::Never => false,
        Enabled::When(predicate) => predicate.test(&settings.inspect, args),
    };
    if !on {
        return None;
    }

    let mut text = match &settings.formatter {
        None => to_debug_string(&settings.inspect, args),
        Some(formatter) => match formatter.apply(&settings.inspect, args) {
            Formatted::Text(text) => text,
            Formatted::Suppress => return None,
            Formatted::Args(replacement) => to_debug_string(&settings.inspect, &replacement),
            Formatted::Value(value) => to_debug_string(&settings.inspect, &[value]),
        },
    };

    if settings.tracing {
        if let Some(location) = caller {
            text.push_str(&call_site_trace(location));
        }
    }
    Some(text)
}

fn call_site_trace(location: &Location<'_>) -> String {
    format!(
        "\n    at {}:{}:{}",
        location.file(),
        location.line(),
        location.column()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;

    fn plain() -> StreamSettings {
        StreamSettings {
            inspect: InspectOptions {
                depth: 2,
                colors: false,
            },
            ..StreamSettings::default()
        }
    }

    #[test]
    fn test_default_rendering() {
        let text = render_entry(&plain(), &args!["retry", 3], None);
        assert_eq!(text.as_deref(), Some("retry 3"));
    }

    #[test]
    fn test_disabled_suppresses() {
        let settings = StreamSettings {
            enabled: false.into(),
            ..plain()
        };
        assert_eq!(render_entry(&settings, &args!["x"], None), None);
    }

    #[test]
    fn test_predicate_on_args() {
        let settings = StreamSettings {
            enabled: Enabled::When(Predicate::args(|args| args.len() > 1)),
            ..plain()
        };
        assert_eq!(render_entry(&settings, &args!["one"], None), None);
        assert_eq!(
            render_entry(&settings, &args!["one", "two"], None).as_deref(),
            Some("one two")
        );
    }

    #[test]
    fn test_predicate_with_text() {
        let settings = StreamSettings {
            enabled: Enabled::When(Predicate::with_text(|text, _| text.contains("error"))),
            ..plain()
        };
        assert_eq!(render_entry(&settings, &args!["all good"], None), None);
        assert!(render_entry(&settings, &args!["an", "error"], None).is_some());
    }

    #[test]
    fn test_formatter_text_is_verbatim() {
        let settings = StreamSettings {
            formatter: Some(Formatter::args(|_| Formatted::Text(String::new()))),
            ..plain()
        };
        assert_eq!(render_entry(&settings, &args!["ignored"], None).as_deref(), Some(""));
    }

    #[test]
    fn test_formatter_suppress_acts_as_filter() {
        let settings = StreamSettings {
            formatter: Some(Formatter::filter(|args| args.first() != Some(&Value::from("noise")))),
            ..plain()
        };
        assert_eq!(render_entry(&settings, &args!["noise", 1], None), None);
        assert_eq!(
            render_entry(&settings, &args!["signal", 1], None).as_deref(),
            Some("signal 1")
        );
    }

    #[test]
    fn test_formatter_replacement_args() {
        let settings = StreamSettings {
            formatter: Some(Formatter::args(|args| {
                let mut out = vec![Value::from("[tagged]")];
                out.extend_from_slice(args);
                Formatted::Args(out)
            })),
            ..plain()
        };
        assert_eq!(
            render_entry(&settings, &args![Value::Null], None).as_deref(),
            Some("[tagged] --null--")
        );
    }

    #[test]
    fn test_formatter_single_value() {
        let settings = StreamSettings {
            formatter: Some(Formatter::args(|args| {
                Formatted::Value(Value::object([("count", args.len())]))
            })),
            ..plain()
        };
        assert_eq!(
            render_entry(&settings, &args!["a", "b"], None).as_deref(),
            Some("{ count: 2 }")
        );
    }

    #[test]
    fn test_formatter_with_precomputed_text() {
        let settings = StreamSettings {
            formatter: Some(Formatter::with_text(|text, args| {
                Formatted::Text(format!("{}|{}", args.len(), text.to_uppercase()))
            })),
            ..plain()
        };
        assert_eq!(
            render_entry(&settings, &args!["hi", 2], None).as_deref(),
            Some("2|HI 2")
        );
    }

    #[test]
    fn test_disabled_wins_over_formatter() {
        let settings = StreamSettings {
            enabled: Enabled::Never,
            formatter: Some(Formatter::args(|_| Formatted::Text("forced".to_string()))),
            ..plain()
        };
        assert_eq!(render_entry(&settings, &args!["x"], None), None);
    }

    #[test]
    fn test_tracing_appends_call_site() {
        let settings = StreamSettings {
            tracing: true,
            ..plain()
        };
        let here = Location::caller();
        let text = render_entry(&settings, &args!["traced"], Some(here)).unwrap();

        assert!(text.starts_with("traced\n    at "));
        assert!(text.contains(here.file()));
        assert!(text.ends_with(&format!(":{}:{}", here.line(), here.column())));
    }

    #[test]
    fn test_tracing_off_ignores_caller() {
        let text = render_entry(&plain(), &args!["plain"], Some(Location::caller())).unwrap();
        assert_eq!(text, "plain");
    }
}
