//! Applies declared styles, loads declared scripts and import-map modules

use crate::core::declaration::Declaration;
use crate::error::{BootError, Result};
use crate::host::{is_url, Document, ImportMap};
use crate::runtime::resolver::ModuleResolver;
use futures::future::{join, join_all, BoxFuture};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, info};

/// Keeps embedded templates invisible; injected ahead of every declared style.
pub const TEMPLATE_HIDE_RULE: &str = "html>body>xmp{display:none}";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub scripts: Vec<String>,
    /// Import-map specifiers that were dynamically imported.
    pub imported: Vec<String>,
    /// Import-map specifiers skipped because they were cached or are URLs.
    pub skipped: Vec<String>,
}

/// Resolves once every script and import started by the loader has completed.
pub struct CompletionSignal {
    inner: BoxFuture<'static, Result<LoadReport>>,
}

impl Future for CompletionSignal {
    type Output = Result<LoadReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

pub struct DependencyLoader {
    document: Arc<dyn Document>,
    resolver: Arc<ModuleResolver>,
    script_timeout: Option<Duration>,
}

impl DependencyLoader {
    pub fn new(document: Arc<dyn Document>, resolver: Arc<ModuleResolver>) -> Self {
        Self {
            document,
            resolver,
            script_timeout: None,
        }
    }

    /// Bounds each script load. Without a bound a stalled script blocks forever.
    pub fn with_script_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.script_timeout = timeout;
        self
    }

    /// Injects the template rule, then every style declaration in order. Each
    /// injection lands ahead of the previous ones.
    pub fn apply_styles(&self, declarations: &[Declaration]) -> usize {
        self.document.inject_style(TEMPLATE_HIDE_RULE);
        let mut applied = 0;
        for declaration in declarations {
            if let Declaration::Style(css) = declaration {
                self.document.inject_style(css);
                applied += 1;
            }
        }
        debug!(applied, "styles injected");
        applied
    }

    /// Appends every script and starts every import-map import, returning a
    /// signal joined over all of them.
    pub fn load_scripts_and_imports(
        &self,
        declarations: &[Declaration],
        import_maps: &[ImportMap],
    ) -> CompletionSignal {
        let mut scripts = Vec::new();
        let mut script_loads = Vec::new();
        for declaration in declarations {
            if let Declaration::Script(url) = declaration {
                debug!(url = %url, "appending script");
                let load = self.document.append_script(url);
                scripts.push(url.clone());
                script_loads.push(wait_for_script(url.clone(), load, self.script_timeout));
            }
        }

        let mut candidates = BTreeSet::new();
        let mut skipped = Vec::new();
        for map in import_maps {
            for specifier in map.imports.keys() {
                if self.resolver.cache().contains(specifier) || is_url(specifier) {
                    skipped.push(specifier.clone());
                } else {
                    candidates.insert(specifier.clone());
                }
            }
        }

        let imported: Vec<String> = candidates.into_iter().collect();
        let imports = imported
            .iter()
            .cloned()
            .map(|specifier| {
                let resolver = Arc::clone(&self.resolver);
                async move { resolver.import_module(&specifier).await.map(|_| ()) }
            })
            .collect::<Vec<_>>();

        CompletionSignal {
            inner: Box::pin(async move {
                let (script_results, import_results) =
                    join(join_all(script_loads), join_all(imports)).await;

                script_results
                    .into_iter()
                    .chain(import_results)
                    .collect::<Result<Vec<()>>>()?;

                info!(
                    scripts = scripts.len(),
                    imported = imported.len(),
                    "scripts and imports ready"
                );
                Ok(LoadReport {
                    scripts,
                    imported,
                    skipped,
                })
            }),
        }
    }

    /// Styles immediately, then scripts and imports behind one signal.
    pub fn load_all(&self, declarations: &[Declaration], import_maps: &[ImportMap]) -> CompletionSignal {
        self.apply_styles(declarations);
        self.load_scripts_and_imports(declarations, import_maps)
    }
}

async fn wait_for_script(
    url: String,
    load: BoxFuture<'static, ()>,
    limit: Option<Duration>,
) -> Result<()> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, load)
            .await
            .map_err(|_| BootError::StalledDependency { url }),
        None => {
            load.await;
            Ok(())
        }
    }
}
