use anyhow::{anyhow, Result};
use schema_mask_registry::scanner::scan;
use schema_mask_registry::{
    Level, Logger, MemorySink, ModuleSource, TypeDef, TypeKind, TypeModule, TypeUniverse,
};

struct BrokenSource;

impl ModuleSource for BrokenSource {
    fn name(&self) -> String {
        "broken".to_string()
    }

    fn load(&self) -> Result<TypeModule> {
        Err(anyhow!("module metadata unavailable"))
    }
}

fn names(defs: &[std::sync::Arc<TypeDef>]) -> Vec<&str> {
    defs.iter().map(|def| def.name.as_str()).collect()
}

#[test]
fn scan_partitions_contracts_and_concretes_in_order() {
    let module = TypeModule::new("widgets")
        .with(TypeDef::contract("IWidget"))
        .with(TypeDef::concrete("Widget").implements("IWidget"))
        .with(TypeDef::contract("IGadget"))
        .with(TypeDef::concrete("Gadget").implements("IGadget"));
    let universe = TypeUniverse::new().with_module(module);
    let result = scan(&universe, &Logger::silent());

    assert_eq!(result.modules, vec!["core".to_string(), "widgets".to_string()]);
    assert_eq!(names(&result.contracts), vec!["IWidget", "IGadget"]);
    assert_eq!(names(&result.concretes), vec!["Widget", "Gadget"]);
}

#[test]
fn generic_definitions_only_reach_the_catalog() {
    let universe = TypeUniverse::new();
    let result = scan(&universe, &Logger::silent());

    assert!(result.contracts.is_empty());
    assert!(result.concretes.is_empty());
    assert_eq!(result.catalog.len(), 4);
    assert_eq!(result.catalog.kind_of("OrderedList"), Some(TypeKind::Contract));
    assert_eq!(result.catalog.kind_of("HashMap"), Some(TypeKind::Concrete));
    assert_eq!(result.catalog.arity_of("KeyValueMap"), Some(2));
}

#[test]
fn dynamic_modules_are_skipped() {
    let generated = TypeModule::dynamic("proxies")
        .with(TypeDef::contract("IProxy"))
        .with(TypeDef::concrete("Proxy").implements("IProxy"));
    let universe = TypeUniverse::new().with_module(generated);
    let result = scan(&universe, &Logger::silent());

    assert_eq!(result.modules, vec!["core".to_string()]);
    assert!(result.catalog.get("IProxy").is_none());
}

#[test]
fn unloadable_sources_are_skipped_with_a_warning() {
    let sink = MemorySink::new();
    let universe = TypeUniverse::new()
        .with_source(BrokenSource)
        .with_module(TypeModule::new("widgets").with(TypeDef::contract("IWidget")));
    let result = scan(&universe, &Logger::memory(&sink, Level::Warn));

    assert_eq!(names(&result.contracts), vec!["IWidget"]);
    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].get("message").and_then(|v| v.as_str()),
        Some("Skipping type module that could not be loaded")
    );
    assert_eq!(
        entries[0]
            .get("data")
            .and_then(|d| d.get("module"))
            .and_then(|v| v.as_str()),
        Some("broken")
    );
}

#[test]
fn duplicate_definitions_keep_the_first() {
    let sink = MemorySink::new();
    let universe = TypeUniverse::new()
        .with_module(TypeModule::new("first").with(TypeDef::contract("IShared")))
        .with_module(TypeModule::new("second").with(TypeDef::concrete("IShared")));
    let result = scan(&universe, &Logger::memory(&sink, Level::Warn));

    assert_eq!(result.catalog.kind_of("IShared"), Some(TypeKind::Contract));
    assert!(result.concretes.is_empty());
    assert_eq!(
        sink.messages_at(Level::Warn),
        vec!["Ignoring duplicate type definition".to_string()]
    );
}

#[test]
fn tags_on_generic_definitions_are_reported() {
    let sink = MemorySink::new();
    let module = TypeModule::new("bags")
        .with(TypeDef::contract("IBagMask").params(&["T"]).tag("bag"))
        .with(TypeDef::contract("IWidgetMask").tag("widget"));
    let universe = TypeUniverse::new().with_module(module);
    let result = scan(&universe, &Logger::memory(&sink, Level::Warn));

    assert_eq!(names(&result.contracts), vec!["IWidgetMask"]);
    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].get("message").and_then(|v| v.as_str()),
        Some("Ignoring schema tags on a generic definition")
    );
    assert_eq!(
        entries[0].get("data").and_then(|d| d.get("type")).and_then(|v| v.as_str()),
        Some("IBagMask")
    );
}
