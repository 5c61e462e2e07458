//! Bootstrap phases and progress observers

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Bootstrap phase, in the order the pipeline enters them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Init,
    StylesReady,
    ScriptsAndImportsReady,
    TemplatesDiscovered,
    RoutesConfigured,
    AppComponentLoaded,
    PluginsActivated,
    GlobalComponentsRegistered,
    RouterReady,
    Mounted,
}

impl Phase {
    pub const ALL: [Phase; 10] = [
        Phase::Init,
        Phase::StylesReady,
        Phase::ScriptsAndImportsReady,
        Phase::TemplatesDiscovered,
        Phase::RoutesConfigured,
        Phase::AppComponentLoaded,
        Phase::PluginsActivated,
        Phase::GlobalComponentsRegistered,
        Phase::RouterReady,
        Phase::Mounted,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Init => "INIT",
            Phase::StylesReady => "STYLES_READY",
            Phase::ScriptsAndImportsReady => "SCRIPTS_AND_IMPORTS_READY",
            Phase::TemplatesDiscovered => "TEMPLATES_DISCOVERED",
            Phase::RoutesConfigured => "ROUTES_CONFIGURED",
            Phase::AppComponentLoaded => "APP_COMPONENT_LOADED",
            Phase::PluginsActivated => "PLUGINS_ACTIVATED",
            Phase::GlobalComponentsRegistered => "GLOBAL_COMPONENTS_REGISTERED",
            Phase::RouterReady => "ROUTER_READY",
            Phase::Mounted => "MOUNTED",
        }
    }

    /// Human-readable marker, suitable for a loading indicator.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Init => "Initializing",
            Phase::StylesReady => "Processing styles",
            Phase::ScriptsAndImportsReady => "Processing scripts and imports",
            Phase::TemplatesDiscovered => "Processing embedded components",
            Phase::RoutesConfigured => "Processing pages",
            Phase::AppComponentLoaded => "Processing app",
            Phase::PluginsActivated => "Processing plugins",
            Phase::GlobalComponentsRegistered => "Processing global components",
            Phase::RouterReady => "Processing router",
            Phase::Mounted => "Ready",
        }
    }

    pub fn next(&self) -> Option<Phase> {
        let idx = Phase::ALL.iter().position(|p| p == self)?;
        Phase::ALL.get(idx + 1).copied()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observer notified once per phase transition. Purely observational.
pub trait ProgressSink: Send + Sync {
    fn record(&self, phase: Phase);
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressEntry {
    pub phase: Phase,
    pub at: Instant,
}

/// Append-only, shareable progress log.
#[derive(Clone, Default)]
pub struct ProgressLog {
    entries: Arc<RwLock<Vec<ProgressEntry>>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ProgressEntry> {
        self.entries.read().clone()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.entries.read().iter().map(|e| e.phase).collect()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.entries.read().iter().map(|e| e.phase.label()).collect()
    }

    /// Furthest phase reached so far.
    pub fn last(&self) -> Option<Phase> {
        self.entries.read().last().map(|e| e.phase)
    }
}

impl ProgressSink for ProgressLog {
    fn record(&self, phase: Phase) {
        self.entries.write().push(ProgressEntry {
            phase,
            at: Instant::now(),
        });
    }
}

/// Emits each marker as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn record(&self, phase: Phase) {
        tracing::info!(phase = phase.name(), "{}", phase.label());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let mut sorted = Phase::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Phase::ALL.to_vec());
        assert_eq!(Phase::Init.next(), Some(Phase::StylesReady));
        assert_eq!(Phase::Mounted.next(), None);
    }

    #[test]
    fn test_progress_log_appends() {
        let log = ProgressLog::new();
        let shared = log.clone();

        shared.record(Phase::Init);
        shared.record(Phase::StylesReady);

        assert_eq!(log.phases(), vec![Phase::Init, Phase::StylesReady]);
        assert_eq!(log.labels(), vec!["Initializing", "Processing styles"]);
        assert_eq!(log.last(), Some(Phase::StylesReady));

        let entries = log.entries();
        assert!(entries[0].at <= entries[1].at);
    }
}
