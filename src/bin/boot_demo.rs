use sfc_bootstrap::core::vfs::EmbeddedTemplate;
use sfc_bootstrap::core::TracingProgress;
use sfc_bootstrap::host::memory::{
    CompiledComponent, MemoryDocument, MemoryEngine, MemoryFetch, MemoryImporter, MemoryRouter,
    PassthroughCompiler, ScriptBehavior,
};
use sfc_bootstrap::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const PUG_URL: &str = "https://pugjs.org/js/pug.js";

fn document() -> MemoryDocument {
    MemoryDocument::new()
        .with_template(EmbeddedTemplate::new(
            "app",
            Some("App.vue"),
            "@import vue\n<nav-bar/><router-view/>",
        ))
        .with_template(EmbeddedTemplate::new(
            "page",
            Some("home.vue"),
            "@import vue\n@style h1{color:teal}\n<h1>Home</h1>",
        ))
        .with_template(EmbeddedTemplate::new(
            "component",
            Some("nav-bar.vue"),
            "<nav><router-link to=\"/\">home</router-link></nav>",
        ))
        .with_import_map(r#"{"imports": {"vue": "https://unpkg.com/vue@3/dist/vue.esm-browser.js"}}"#)
        .with_script(PUG_URL, ScriptBehavior::Delayed(Duration::from_millis(20)))
        .with_script_global(PUG_URL, "pug", Module::new("pug"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    sfc_bootstrap::runtime_check()?;
    tracing::info!("{}", sfc_bootstrap::build_info());

    let config = BootConfig::new()
        .with_route(RouteDescriptor::page("/", "home.vue").with_name("home"))
        .with_import(Declaration::style("body{margin:0}"))
        .with_import(Declaration::plugin(plugin_fn!("greeter", |ctx: PluginContext| async move {
            tracing::info!(engine = ?ctx.engine(), "greeter plugin activated");
            Ok::<(), BootError>(())
        })));

    let booted = Bootstrap::build()
        .with_config(config)
        .with_document(document())
        .with_fetch(MemoryFetch::new())
        .with_importer(MemoryImporter::new())
        .with_compiler(PassthroughCompiler::new())
        .with_engine(MemoryEngine::new())
        .with_progress(TracingProgress)
        .build()?
        .run()
        .await?;

    let router = booted
        .router
        .as_any()
        .downcast_ref::<MemoryRouter>()
        .ok_or_else(|| BootError::Router("unexpected router type".to_string()))?;
    let home = router.navigate("/").await?;
    if let Some(page) = home.downcast_ref::<CompiledComponent>() {
        tracing::info!(path = %page.path, bytes = page.source.len(), "navigated to home");
    }

    tracing::info!(modules = ?booted.resolver.cache().specifiers(), "boot complete");
    Ok(())
}
