//! The application identity that roots every stream file path.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Callback told about the identity; `None` while unset.
pub type IdentityListener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

#[derive(Default)]
struct IdentityState {
    id: Option<String>,
    pending: Vec<IdentityListener>,
}

/// Set-once application identifier.
///
/// Starts unset. The first successful [`AppIdentity::set`] commits a
/// normalized value for the lifetime of the object and notifies every
/// listener registered so far, exactly once.
#[derive(Default)]
pub struct AppIdentity {
    state: Mutex<IdentityState>,
}

impl std::fmt::Debug for AppIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppIdentity")
            .field("id", &self.state.lock().id)
            .finish()
    }
}

impl AppIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current identity, `None` until set.
    pub fn get(&self) -> Option<String> {
        self.state.lock().id.clone()
    }

    pub fn is_set(&self) -> bool {
        self.state.lock().id.is_some()
    }

    /// Normalizes and commits `id`, returning the committed value.
    ///
    /// Setting the same (normalized) value again is a no-op; a different
    /// value fails with [`Error::IdentityConflict`].
    pub fn set(&self, id: &str) -> Result<String> {
        let normalized = normalize_app_id(id);
        if normalized.is_empty() {
            return Err(Error::InvalidAppId(id.to_string()));
        }

        let listeners = {
            let mut state = self.state.lock();
            match &state.id {
                Some(current) if *current == normalized => return Ok(normalized),
                Some(current) => {
                    return Err(Error::IdentityConflict {
                        current: current.clone(),
                        requested: normalized,
                    });
                }
                None => {
                    state.id = Some(normalized.clone());
                    std::mem::take(&mut state.pending)
                }
            }
        };

        info!(app_id = %normalized, "app identity set");
        for listener in listeners {
            listener(Some(&normalized));
        }
        Ok(normalized)
    }

    /// Calls `listener` now with the current identity and, if still unset,
    /// once more when the identity gets committed.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        let listener: IdentityListener = Arc::new(listener);
        let current = {
            let mut state = self.state.lock();
            if state.id.is_none() {
                state.pending.push(Arc::clone(&listener));
            }
            state.id.clone()
        };
        listener(current.as_deref());
    }
}

/// Turns an app name or a program path into a directory-safe identity.
///
/// `"/work/My App/index.js"` becomes `"my-app"`, `"target/debug/fancyServer"`
/// becomes `"fancy-server"`.
pub fn normalize_app_id(raw: &str) -> String {
    let mut id = raw.trim().replace('\\', "/");
    for entry_file in ["/index.js", "/main.rs", "/lib.rs", "/mod.rs"] {
        if let Some(stripped) = id.strip_suffix(entry_file) {
            id = stripped.to_string();
        }
    }
    let mut last = id.trim_end_matches('/').rsplit('/').next().unwrap_or("").to_string();
    for ext in [".js", ".rs", ".exe"] {
        if let Some(stripped) = last.strip_suffix(ext) {
            last = stripped.to_string();
        }
    }
    normalize_segment(&last)
}

/// Whitespace runs to `-`, `aB` camel boundaries to `a-b`, lowercase.
pub fn normalize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev: Option<char> = None;
    let mut in_space = false;

    for c in raw.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
            prev = Some('-');
            continue;
        }
        in_space = false;
        if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase()) {
            out.push('-');
        }
        out.extend(c.to_lowercase());
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    #[test]
    fn test_normalize_segment() {
        assert_eq!(normalize_segment("fancyStream"), "fancy-stream");
        assert_eq!(normalize_segment("My App"), "my-app");
        assert_eq!(normalize_segment("  spaced   out  "), "spaced-out");
        assert_eq!(normalize_segment("HTTPServer"), "httpserver");
        assert_eq!(normalize_segment("already-dashed"), "already-dashed");
        assert_eq!(normalize_segment(""), "");
    }

    #[test]
    fn test_normalize_app_id_strips_paths() {
        assert_eq!(normalize_app_id("My App"), "my-app");
        assert_eq!(normalize_app_id("/work/sampler/index.js"), "sampler");
        assert_eq!(normalize_app_id("/work/tools/fancyTool.js"), "fancy-tool");
        assert_eq!(normalize_app_id("target/debug/netProbe"), "net-probe");
        assert_eq!(normalize_app_id("C:\\bin\\Probe.exe"), "probe");
        assert_eq!(normalize_app_id("src/main.rs"), "src");
    }

    #[test]
    fn test_set_commits_normalized_value() {
        let identity = AppIdentity::new();
        assert!(!identity.is_set());

        assert_eq!(identity.set("My App").unwrap(), "my-app");
        assert_eq!(identity.get().as_deref(), Some("my-app"));
    }

    #[test]
    fn test_set_same_value_is_noop() {
        let identity = AppIdentity::new();
        identity.set("my-app").unwrap();

        assert_eq!(identity.set("My App").unwrap(), "my-app");
    }

    #[test]
    fn test_set_different_value_conflicts() {
        let identity = AppIdentity::new();
        identity.set("first").unwrap();

        match identity.set("second") {
            Err(Error::IdentityConflict { current, requested }) => {
                assert_eq!(current, "first");
                assert_eq!(requested, "second");
            }
            other => panic!("Expected IdentityConflict, got {other:?}"),
        }
        assert_eq!(identity.get().as_deref(), Some("first"));
    }

    #[test]
    fn test_set_rejects_empty() {
        let identity = AppIdentity::new();
        assert!(matches!(identity.set("   "), Err(Error::InvalidAppId(raw)) if raw == "   "));
        assert!(!identity.is_set());
    }

    #[test]
    fn test_listener_called_immediately_and_on_transition() {
        let identity = AppIdentity::new();
        let seen = Arc::new(PlMutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        identity.on_change(move |id| sink.lock().push(id.map(str::to_string)));
        assert_eq!(*seen.lock(), vec![None]);

        identity.set("app").unwrap();
        identity.set("app").unwrap();
        assert_eq!(*seen.lock(), vec![None, Some("app".to_string())]);
    }

    #[test]
    fn test_late_listener_sees_identity_once() {
        let identity = AppIdentity::new();
        identity.set("app").unwrap();

        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        identity.on_change(move |id| sink.lock().push(id.map(str::to_string)));

        assert_eq!(*seen.lock(), vec![Some("app".to_string())]);
    }

    #[test]
    fn test_listener_may_read_identity() {
        let identity = Arc::new(AppIdentity::new());
        let observed = Arc::new(PlMutex::new(None));

        let weak = Arc::downgrade(&identity);
        let sink = Arc::clone(&observed);
        identity.on_change(move |_| {
            if let Some(identity) = weak.upgrade() {
                *sink.lock() = identity.get();
            }
        });
        identity.set("reentrant").unwrap();

        assert_eq!(observed.lock().as_deref(), Some("reentrant"));
    }
}
