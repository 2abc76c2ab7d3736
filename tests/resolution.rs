use anyhow::Result;
use schema_mask_registry::{
    Level, Logger, MemorySink, OverrideOrigin, RegistryError, Resolver, ResolverOptions, TypeDef,
    TypeModule, TypeRef, TypeUniverse,
};

fn quiet() -> ResolverOptions {
    ResolverOptions {
        logger: Logger::silent(),
        ..ResolverOptions::default()
    }
}

fn build(module: TypeModule) -> Result<Resolver> {
    Ok(Resolver::build(&TypeUniverse::new().with_module(module), quiet())?)
}

fn parse(input: &str) -> TypeRef {
    TypeRef::parse(input).unwrap()
}

#[test]
fn resolution_is_stable_across_calls() -> Result<()> {
    let resolver = build(
        TypeModule::new("widgets")
            .with(TypeDef::contract("IWidget"))
            .with(TypeDef::concrete("Widget").implements("IWidget")),
    )?;

    let first = resolver.resolve_default_implementation(&"IWidget".into())?;
    for _ in 0..10 {
        assert_eq!(resolver.resolve_default_implementation(&"IWidget".into())?, first);
    }
    assert_eq!(first, Some(TypeRef::named("Widget")));
    Ok(())
}

#[test]
fn override_beats_mask_default() -> Result<()> {
    let resolver = build(
        TypeModule::new("widgets")
            .with(
                TypeDef::contract("IWidgetMask")
                    .tag("widget:Default")
                    .deserialize_as("SpecialWidget"),
            )
            .with(TypeDef::concrete("WidgetMaskImpl").implements("IWidgetMask"))
            .with(TypeDef::concrete("SpecialWidget").implements("IWidgetMask")),
    )?;

    assert_eq!(
        resolver.resolve_default_implementation(&"IWidgetMask".into())?,
        Some(TypeRef::named("SpecialWidget"))
    );
    let records = resolver.mask_schema_interface_info("widget:Default").unwrap();
    assert_eq!(records[0].default_implementation(), Some(&TypeRef::named("WidgetMaskImpl")));
    Ok(())
}

#[test]
fn mask_default_beats_structural_discovery() -> Result<()> {
    let resolver = build(
        TypeModule::new("parts")
            .with(TypeDef::contract("IResource"))
            .with(TypeDef::contract("IPartMask").extends("IResource").tag("part"))
            .with(TypeDef::concrete("Unrelated").implements("IResource"))
            .with(TypeDef::concrete("PartImpl").implements("IPartMask")),
    )?;

    assert_eq!(
        resolver.resolve_default_implementation(&"IPartMask".into())?,
        Some(TypeRef::named("PartImpl"))
    );
    assert_eq!(
        resolver.resolve_default_implementation(&"IResource".into())?,
        Some(TypeRef::named("Unrelated"))
    );
    Ok(())
}

#[test]
fn first_registration_wins_and_follows_scan_order() -> Result<()> {
    let x = TypeDef::concrete("X").implements("C");
    let y = TypeDef::concrete("Y").implements("C");

    let forward = build(
        TypeModule::new("forward")
            .with(TypeDef::contract("C"))
            .with(x.clone())
            .with(y.clone()),
    )?;
    assert_eq!(forward.resolve_default_implementation(&"C".into())?, Some(TypeRef::named("X")));

    let swapped = build(
        TypeModule::new("swapped")
            .with(TypeDef::contract("C"))
            .with(y)
            .with(x),
    )?;
    assert_eq!(swapped.resolve_default_implementation(&"C".into())?, Some(TypeRef::named("Y")));
    Ok(())
}

#[test]
fn ordered_list_binds_its_element_type() -> Result<()> {
    let resolver = build(TypeModule::new("widgets").with(TypeDef::contract("Widget")))?;

    assert_eq!(
        resolver.resolve_deserializer_implementation(&parse("OrderedList<Widget>"))?,
        Some(parse("ArrayList<Widget>"))
    );
    let nested = parse("KeyValueMap<String, OrderedList<Widget>>");
    assert_eq!(
        resolver.resolve_deserializer_implementation(&nested)?,
        Some(parse("HashMap<String, OrderedList<Widget>>"))
    );
    assert_eq!(
        resolver.resolve_default_implementation(&parse("OrderedList<Widget>"))?,
        Some(parse("ArrayList<Widget>"))
    );
    assert_eq!(
        resolver.resolve_deserializer_implementation(&"OrderedList".into())?,
        Some(TypeRef::named("ArrayList"))
    );
    Ok(())
}

#[test]
fn deserializer_lookup_ignores_masks_and_structure() -> Result<()> {
    let resolver = build(
        TypeModule::new("widgets")
            .with(TypeDef::contract("IWidgetMask").tag("widget:Default"))
            .with(TypeDef::concrete("WidgetMaskImpl").implements("IWidgetMask")),
    )?;

    assert_eq!(resolver.resolve_deserializer_implementation(&"IWidgetMask".into())?, None);
    assert_eq!(
        resolver.resolve_default_implementation(&"IWidgetMask".into())?,
        Some(TypeRef::named("WidgetMaskImpl"))
    );
    Ok(())
}

#[test]
fn generic_annotation_binds_arguments() -> Result<()> {
    let resolver = build(
        TypeModule::new("bags")
            .with(TypeDef::contract("Bag").params(&["T"]).deserialize_as(parse("ArrayBag<T>")))
            .with(TypeDef::concrete("ArrayBag").params(&["T"]).implements(parse("Bag<T>")))
            .with(TypeDef::contract("Widget")),
    )?;

    assert_eq!(
        resolver.resolve_deserializer_implementation(&parse("Bag<Widget>"))?,
        Some(parse("ArrayBag<Widget>"))
    );
    let entry = resolver.override_for(&"Bag".into()).unwrap();
    assert_eq!(entry.origin, OverrideOrigin::Annotation);
    assert_eq!(entry.arity, 1);
    Ok(())
}

#[test]
fn preferred_for_pairs_a_concrete_with_a_contract() -> Result<()> {
    let resolver = build(
        TypeModule::new("docs")
            .with(TypeDef::contract("IDoc"))
            .with(TypeDef::concrete("DocA").implements("IDoc"))
            .with(TypeDef::concrete("DocB").implements("IDoc").preferred_for("IDoc")),
    )?;

    let doc_b = Some(TypeRef::named("DocB"));
    assert_eq!(resolver.resolve_deserializer_implementation(&"IDoc".into())?, doc_b);
    assert_eq!(resolver.resolve_default_implementation(&"IDoc".into())?, doc_b);
    Ok(())
}

#[test]
fn explicit_overrides_take_precedence_over_annotations() -> Result<()> {
    let module = TypeModule::new("docs")
        .with(TypeDef::contract("IDoc").deserialize_as("DocA"))
        .with(TypeDef::concrete("DocA").implements("IDoc"))
        .with(TypeDef::concrete("DocB").implements("IDoc"));
    let options = ResolverOptions {
        overrides: vec![(TypeRef::named("IDoc"), TypeRef::named("DocB"))],
        ..quiet()
    };
    let resolver = Resolver::build(&TypeUniverse::new().with_module(module), options)?;

    assert_eq!(
        resolver.resolve_default_implementation(&"IDoc".into())?,
        Some(TypeRef::named("DocB"))
    );
    assert_eq!(resolver.override_for(&"IDoc".into()).unwrap().origin, OverrideOrigin::Config);
    Ok(())
}

#[test]
fn explicit_override_with_wrong_arity_fails_fast() {
    let module = TypeModule::new("bags")
        .with(TypeDef::contract("Bag").params(&["T"]))
        .with(TypeDef::concrete("PlainBag"));
    let options = ResolverOptions {
        overrides: vec![(TypeRef::named("Bag"), TypeRef::named("PlainBag"))],
        ..quiet()
    };
    let err = Resolver::build(&TypeUniverse::new().with_module(module), options).unwrap_err();
    assert!(matches!(err, RegistryError::ArityMismatch { expected: 1, actual: 0, .. }));
}

#[test]
fn bad_annotations_are_logged_and_skipped() -> Result<()> {
    let sink = MemorySink::new();
    let module = TypeModule::new("bags")
        .with(TypeDef::contract("Bag").params(&["T"]).deserialize_as("PlainBag"))
        .with(TypeDef::concrete("PlainBag"));
    let options = ResolverOptions {
        logger: Logger::memory(&sink, Level::Warn),
        ..ResolverOptions::default()
    };
    let resolver = Resolver::build(&TypeUniverse::new().with_module(module), options)?;

    assert!(resolver.override_for(&"Bag".into()).is_none());
    assert_eq!(
        sink.messages_at(Level::Warn),
        vec!["Rejected deserializer annotation".to_string()]
    );
    Ok(())
}

#[test]
fn misspelled_annotation_target_keeps_the_mask_default() -> Result<()> {
    let sink = MemorySink::new();
    let module = TypeModule::new("widgets")
        .with(
            TypeDef::contract("IWidgetMask")
                .tag("widget:Default")
                .deserialize_as("SpecialWidgt"),
        )
        .with(TypeDef::concrete("WidgetMaskImpl").implements("IWidgetMask"));
    let options = ResolverOptions {
        logger: Logger::memory(&sink, Level::Warn),
        ..ResolverOptions::default()
    };
    let resolver = Resolver::build(&TypeUniverse::new().with_module(module), options)?;

    assert_eq!(
        resolver.resolve_default_implementation(&"IWidgetMask".into())?,
        Some(TypeRef::named("WidgetMaskImpl"))
    );
    assert!(resolver.override_for(&"IWidgetMask".into()).is_none());
    assert_eq!(resolver.stats().overrides, 2);
    assert_eq!(
        sink.messages_at(Level::Warn),
        vec!["Rejected deserializer annotation".to_string()]
    );
    Ok(())
}

#[test]
fn explicit_override_to_an_unknown_type_fails_fast() {
    let module = TypeModule::new("widgets")
        .with(TypeDef::contract("IWidgetMask"))
        .with(TypeDef::concrete("WidgetMaskImpl").implements("IWidgetMask"));
    let options = ResolverOptions {
        overrides: vec![(TypeRef::named("IWidgetMask"), TypeRef::named("Nope"))],
        ..quiet()
    };
    let err = Resolver::build(&TypeUniverse::new().with_module(module), options).unwrap_err();
    assert_eq!(err, RegistryError::UnknownType(TypeRef::named("Nope")));
}

#[test]
fn explicit_override_for_an_unknown_contract_is_skipped() -> Result<()> {
    let sink = MemorySink::new();
    let module = TypeModule::new("widgets")
        .with(TypeDef::contract("IWidgetMask"))
        .with(TypeDef::concrete("WidgetMaskImpl").implements("IWidgetMask"));
    let options = ResolverOptions {
        overrides: vec![(TypeRef::named("IWidgetMsk"), TypeRef::named("WidgetMaskImpl"))],
        logger: Logger::memory(&sink, Level::Warn),
        ..ResolverOptions::default()
    };
    let resolver = Resolver::build(&TypeUniverse::new().with_module(module), options)?;

    assert!(resolver.override_for(&"IWidgetMsk".into()).is_none());
    assert_eq!(resolver.stats().overrides, 2);
    assert_eq!(
        sink.messages_at(Level::Warn),
        vec!["Ignoring override for a contract that was never scanned".to_string()]
    );
    Ok(())
}

#[test]
fn falls_through_when_mask_has_no_implementation() -> Result<()> {
    let resolver = build(
        TypeModule::new("mixed")
            .with(TypeDef::contract("IBase"))
            .with(TypeDef::contract("IEmptyMask").tag("empty"))
            .with(TypeDef::concrete("Lonely").implements("IBase")),
    )?;

    assert_eq!(resolver.resolve_default_implementation(&"IEmptyMask".into())?, None);
    assert_eq!(
        resolver.resolve_default_implementation(&"IBase".into())?,
        Some(TypeRef::named("Lonely"))
    );
    Ok(())
}

#[test]
fn unknown_contract_is_not_found() -> Result<()> {
    let resolver = build(TypeModule::new("empty"))?;
    assert_eq!(resolver.resolve_default_implementation(&"INowhere".into())?, None);
    assert_eq!(resolver.resolve_deserializer_implementation(&"INowhere".into())?, None);
    Ok(())
}

#[test]
fn concrete_type_is_rejected_as_contract() -> Result<()> {
    let resolver = build(
        TypeModule::new("widgets")
            .with(TypeDef::contract("IWidget"))
            .with(TypeDef::concrete("Widget").implements("IWidget")),
    )?;

    let err = resolver
        .resolve_default_implementation(&"Widget".into())
        .unwrap_err();
    assert_eq!(err, RegistryError::NotAContract(TypeRef::named("Widget")));
    assert!(resolver.resolve_deserializer_implementation(&"Widget".into()).is_err());
    assert!(resolver
        .resolve_deserializer_implementation(&parse("ArrayList<Widget>"))
        .is_err());
    Ok(())
}

#[test]
fn wrong_argument_count_is_rejected() -> Result<()> {
    let resolver = build(TypeModule::new("empty"))?;
    let err = resolver
        .resolve_deserializer_implementation(&parse("OrderedList<A, B>"))
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::ArityMismatch {
            type_ref: parse("OrderedList<A, B>"),
            expected: 1,
            actual: 2,
        }
    );
    Ok(())
}

#[test]
fn property_hint_resolves_element_implementation() -> Result<()> {
    let resolver = build(
        TypeModule::new("assemblies")
            .with(TypeDef::contract("IPartMask").tag("part"))
            .with(TypeDef::concrete("PartImpl").implements("IPartMask"))
            .with(TypeDef::contract("IAssembly"))
            .with(
                TypeDef::concrete("Assembly")
                    .implements("IAssembly")
                    .property("children", "IPartMask"),
            ),
    )?;

    assert_eq!(
        resolver.resolve_property_element(&"Assembly".into(), "children")?,
        Some(TypeRef::named("PartImpl"))
    );
    assert_eq!(resolver.resolve_property_element(&"Assembly".into(), "parents")?, None);
    Ok(())
}

#[test]
fn fingerprint_is_deterministic_for_the_same_universe() -> Result<()> {
    let module = || {
        TypeModule::new("widgets")
            .with(TypeDef::contract("IWidgetMask").tag("widget:Default"))
            .with(TypeDef::concrete("WidgetMaskImpl").implements("IWidgetMask"))
    };
    let first = build(module())?;
    let second = build(module())?;
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.fingerprint().len(), 64);

    let different = build(module().with(TypeDef::concrete("Other").implements("IWidgetMask")))?;
    assert_ne!(first.fingerprint(), different.fingerprint());

    let stats = first.stats();
    assert_eq!(stats.modules, vec!["core".to_string(), "widgets".to_string()]);
    assert_eq!(stats.tags, 1);
    assert_eq!(stats.overrides, 2);
    Ok(())
}
