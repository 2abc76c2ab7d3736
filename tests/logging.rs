use schema_mask_registry::{Level, Logger, MemorySink};
use serde_json::{json, Value};

#[test]
fn entries_below_the_minimum_are_dropped() {
    let sink = MemorySink::new();
    let logger = Logger::memory(&sink, Level::Warn);

    logger.debug("hidden", None);
    logger.info("hidden too", None);
    logger.warn("shown", None);
    logger.error("also shown", None);

    let levels: Vec<String> = sink
        .entries()
        .iter()
        .filter_map(|entry| entry.get("level").and_then(Value::as_str).map(str::to_string))
        .collect();
    assert_eq!(levels, vec!["warn", "error"]);
}

#[test]
fn entries_carry_component_tags_and_timestamp() {
    let sink = MemorySink::new();
    let logger = Logger::memory(&sink, Level::Trace)
        .with_tags(json!({ "tenant": "acme", "nested": { "dropped": true } }));

    logger.info("index built", Some(json!({ "tags": 3 })));
    logger.trace("scalar payload", Some(json!("raw")));

    let entries = sink.entries();
    assert_eq!(entries.len(), 2);

    let first = &entries[0];
    assert_eq!(first.get("message"), Some(&json!("index built")));
    assert_eq!(first.get("data"), Some(&json!({ "tags": 3 })));
    assert_eq!(
        first.get("tags"),
        Some(&json!({ "component": "mask-registry", "tenant": "acme" }))
    );
    let timestamp = first.get("timestamp").and_then(Value::as_str).unwrap();
    assert!(timestamp.ends_with('Z'));

    assert_eq!(entries[1].get("data"), Some(&json!({ "value": "raw" })));
}

#[test]
fn levels_parse_case_insensitively() {
    assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
    assert_eq!(" trace ".parse::<Level>().unwrap(), Level::Trace);
    assert!("fatal".parse::<Level>().is_err());
}
