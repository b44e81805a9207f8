//! Grouped debug logging.
//!
//! Every request attempt gets its own scope. Lines logged into a scope are
//! kept together so that concurrent requests never interleave, and the
//! scope is always closed, at the latest when its [`LogScope`] guard drops.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u64);

/// Structured logging capability used by the client in debug mode.
pub trait DebugLogger: Send + Sync {
    fn begin_scope(&self, label: &str) -> ScopeId;
    fn log(&self, scope: ScopeId, message: &str, fields: &[(&str, String)]);
    fn start_timer(&self, scope: ScopeId, label: &str);
    fn end_timer(&self, scope: ScopeId, label: &str);
    fn end_scope(&self, scope: ScopeId);
}

/// Guard over an open scope. A disabled guard swallows everything.
pub struct LogScope {
    inner: Option<(Arc<dyn DebugLogger>, ScopeId)>,
}

impl LogScope {
    pub fn open(logger: &Arc<dyn DebugLogger>, label: &str) -> Self {
        let id = logger.begin_scope(label);
        Self {
            inner: Some((Arc::clone(logger), id)),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn log(&self, message: &str, fields: &[(&str, String)]) {
        if let Some((logger, id)) = &self.inner {
            logger.log(*id, message, fields);
        }
    }

    pub fn start_timer(&self, label: &str) {
        if let Some((logger, id)) = &self.inner {
            logger.start_timer(*id, label);
        }
    }

    pub fn end_timer(&self, label: &str) {
        if let Some((logger, id)) = &self.inner {
            logger.end_timer(*id, label);
        }
    }

    /// Closes the scope now.
    pub fn end(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if let Some((logger, id)) = self.inner.take() {
            logger.end_scope(id);
        }
    }
}

impl Drop for LogScope {
    fn drop(&mut self) {
        self.close();
    }
}

enum Line {
    Message {
        message: String,
        fields: Vec<(String, String)>,
    },
    Timer {
        label: String,
        elapsed: Duration,
    },
}

struct ScopeBuffer {
    label: String,
    lines: Vec<Line>,
    timers: HashMap<String, Instant>,
}

/// Default [`DebugLogger`]: buffers each scope and emits it through
/// `tracing` as one burst of `DEBUG` events inside an `api_request` span.
#[derive(Default)]
pub struct TracingLogger {
    next_id: AtomicU64,
    scopes: Mutex<HashMap<ScopeId, ScopeBuffer>>,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scopes opened and not yet ended.
    pub fn open_scopes(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ScopeId, ScopeBuffer>> {
        self.scopes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DebugLogger for TracingLogger {
    fn begin_scope(&self, label: &str) -> ScopeId {
        let id = ScopeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(
            id,
            ScopeBuffer {
                label: label.to_owned(),
                lines: Vec::new(),
                timers: HashMap::new(),
            },
        );
        id
    }

    fn log(&self, scope: ScopeId, message: &str, fields: &[(&str, String)]) {
        if let Some(buffer) = self.lock().get_mut(&scope) {
            buffer.lines.push(Line::Message {
                message: message.to_owned(),
                fields: fields
                    .iter()
                    .map(|(key, value)| ((*key).to_owned(), value.clone()))
                    .collect(),
            });
            return;
        }
        // Scope already gone: emit directly rather than lose the line.
        let fields = render_fields(fields.iter().map(|(k, v)| (*k, v.as_str())));
        tracing::debug!(fields = %fields, "{message}");
    }

    fn start_timer(&self, scope: ScopeId, label: &str) {
        if let Some(buffer) = self.lock().get_mut(&scope) {
            buffer.timers.insert(label.to_owned(), Instant::now());
        }
    }

    fn end_timer(&self, scope: ScopeId, label: &str) {
        if let Some(buffer) = self.lock().get_mut(&scope) {
            if let Some(started) = buffer.timers.remove(label) {
                buffer.lines.push(Line::Timer {
                    label: label.to_owned(),
                    elapsed: started.elapsed(),
                });
            }
        }
    }

    fn end_scope(&self, scope: ScopeId) {
        let Some(buffer) = self.lock().remove(&scope) else {
            return;
        };

        let span = tracing::debug_span!("api_request", scope = %buffer.label);
        let _entered = span.enter();
        for line in buffer.lines {
            match line {
                Line::Message { message, fields } => {
                    let fields = render_fields(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                    tracing::debug!(fields = %fields, "{message}");
                }
                Line::Timer { label, elapsed } => {
                    tracing::debug!(elapsed_ms = elapsed.as_secs_f64() * 1_000.0, "timer '{label}'");
                }
            }
        }
    }
}

fn render_fields<'a>(fields: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    fields
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::{DebugLogger, LogScope, ScopeId, TracingLogger};

    #[derive(Default)]
    struct Counting {
        ended: AtomicUsize,
    }

    impl DebugLogger for Counting {
        fn begin_scope(&self, _label: &str) -> ScopeId {
            ScopeId(0)
        }
        fn log(&self, _scope: ScopeId, _message: &str, _fields: &[(&str, String)]) {}
        fn start_timer(&self, _scope: ScopeId, _label: &str) {}
        fn end_timer(&self, _scope: ScopeId, _label: &str) {}
        fn end_scope(&self, _scope: ScopeId) {
            self.ended.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn scope_ends_exactly_once() {
        let counting = Arc::new(Counting::default());
        let logger: Arc<dyn DebugLogger> = counting.clone();

        LogScope::open(&logger, "explicit").end();
        assert_eq!(counting.ended.load(Ordering::SeqCst), 1);

        {
            let _scope = LogScope::open(&logger, "dropped");
        }
        assert_eq!(counting.ended.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disabled_scope_is_inert() {
        let scope = LogScope::disabled();
        assert!(!scope.is_enabled());
        scope.log("ignored", &[]);
        scope.end();
    }

    #[test]
    fn tracing_logger_releases_buffers() {
        let tracing_logger = Arc::new(TracingLogger::new());
        let logger: Arc<dyn DebugLogger> = tracing_logger.clone();

        let first = LogScope::open(&logger, "GET /a");
        let second = LogScope::open(&logger, "GET /b");
        first.start_timer("Duration");
        first.log("Request Details", &[("url", "http://api/a".to_owned())]);
        first.end_timer("Duration");
        assert_eq!(tracing_logger.open_scopes(), 2);

        first.end();
        drop(second);
        assert_eq!(tracing_logger.open_scopes(), 0);
    }
}
