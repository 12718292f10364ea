use std::fs;

use compaudit::migration::plan;
use compaudit::{
    detect_version, execute, parse_document, read_document, score_dimension, validate, Approval,
    AttributeValue, ComponentKind, Dimension, EngineConfig, SchemaVersion,
};
use tempfile::tempdir;

fn doc(text: &str, kind: ComponentKind) -> compaudit::ComponentDocument {
    parse_document(text, kind).unwrap()
}

// ── Scenarios ───────────────────────────────────────────────────────

#[test]
fn command_short_alias_is_one_error() {
    let r = validate(&doc(
        "---\ndescription: \"x\"\nmodel: \"haiku\"\n---\nDo x.\n",
        ComponentKind::Command,
    ));
    assert_eq!(r.errors.len(), 1);
    assert!(r.errors[0].message.contains("short alias"));
    assert!(r.errors[0].message.contains("not permitted for commands"));
}

#[test]
fn skill_model_is_one_error() {
    let r = validate(&doc(
        "---\nname: my-skill\ndescription: \"does x\"\nmodel: \"sonnet\"\n---\n",
        ComponentKind::Skill,
    ));
    assert_eq!(r.errors.len(), 1);
    assert_eq!(
        r.errors[0].message,
        "model attribute not permitted for skills"
    );
}

#[test]
fn wildcard_hook_warns_and_costs_security() {
    let hook = doc(
        r#"{"hooks":{"PreToolUse":[{"matcher":"*","hooks":[{"type":"command","command":"echo ok"}]}]}}"#,
        ComponentKind::Hook,
    );
    let r = validate(&hook);
    assert!(r.errors.is_empty());
    assert_eq!(r.warnings.len(), 1);
    assert!(score_dimension(&hook, Dimension::Security).score < 10);
}

#[test]
fn headerless_title_migrates_to_current() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agents").join("helper.md");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "# My Helper\n\nYou are a helpful assistant.\n").unwrap();

    let original = read_document(&path, None).unwrap();
    assert_eq!(original.kind, ComponentKind::Agent);
    assert_eq!(detect_version(&original), SchemaVersion::PreInitial);

    let config = EngineConfig::default();
    let p = plan(&original, &config);
    let first = &p.changes[0];
    assert_eq!(first.id, "extract-name");
    let named = first.apply(&original).unwrap().unwrap();
    assert_eq!(
        named.attribute("name"),
        Some(&AttributeValue::scalar("my-helper"))
    );

    let outcome = execute(&path, &original, &p, &Approval::All, &config).unwrap();
    assert!(outcome.after.passed());

    let migrated = read_document(&path, None).unwrap();
    assert!(validate(&migrated).passed());
    assert_eq!(detect_version(&migrated), SchemaVersion::Current);
}

// ── Properties ──────────────────────────────────────────────────────

#[test]
fn conforming_documents_pass() {
    let cases = [
        (
            "---\nname: reviewer\ndescription: Reviews code\ntools: Read, Grep\nmodel: opus\ncolor: green\n---\n",
            ComponentKind::Agent,
        ),
        (
            "---\nname: pdf-tools\ndescription: Works with PDFs\nallowed-tools: Read\nversion: 1.2.0\n---\n",
            ComponentKind::Skill,
        ),
        (
            "---\ndescription: Run tests\nargument-hint: \"[path]\"\nmodel: claude-haiku-4-5-20251001\n---\nRun them.\n",
            ComponentKind::Command,
        ),
        (
            r#"{"hooks":{"Stop":[{"hooks":[{"type":"prompt","prompt":"Check that all tasks are complete"}]}]}}"#,
            ComponentKind::Hook,
        ),
    ];
    for (text, kind) in cases {
        let r = validate(&doc(text, kind));
        assert!(r.passed(), "{kind}: {:?}", r.errors);
    }
}

#[test]
fn missing_required_attribute_is_named() {
    for (text, kind, missing) in [
        ("---\ndescription: d\n---\n", ComponentKind::Agent, "name"),
        ("---\nname: x\n---\n", ComponentKind::Agent, "description"),
        ("---\nname: x\n---\n", ComponentKind::Skill, "description"),
        ("---\nmodel: opus\n---\nBody\n", ComponentKind::Command, "description"),
    ] {
        let r = validate(&doc(text, kind));
        assert!(
            r.errors.iter().any(|e| e.message.contains(missing)),
            "{kind} missing {missing}: {:?}",
            r.errors
        );
    }
}

#[test]
fn argument_hint_list_and_string_normalize_alike() {
    let list = doc(
        "---\ndescription: d\nargument-hint: [\"[file]\", \"[mode]\"]\n---\nBody\n",
        ComponentKind::Command,
    );
    let joined = doc(
        "---\ndescription: d\nargument-hint: \"[file] [mode]\"\n---\nBody\n",
        ComponentKind::Command,
    );
    assert_eq!(
        list.attribute("argument-hint").unwrap().normalized(),
        joined.attribute("argument-hint").unwrap().normalized()
    );
    assert!(validate(&list).passed());
    assert!(validate(&joined).passed());
}

#[test]
fn any_skill_model_is_error() {
    for value in ["sonnet", "inherit", "claude-opus-4-5", "[a, b]", "{x: 1}", "\"\""] {
        let text = format!("---\nname: s\ndescription: d\nmodel: {value}\n---\n");
        let r = validate(&doc(&text, ComponentKind::Skill));
        assert!(!r.errors.is_empty(), "model: {value}");
    }
}

#[test]
fn mnemonic_model_differs_between_command_and_agent() {
    for mnemonic in ["sonnet", "opus", "haiku"] {
        let command = format!("---\ndescription: d\nmodel: {mnemonic}\n---\nBody\n");
        let agent = format!("---\nname: a\ndescription: d\nmodel: {mnemonic}\n---\n");
        assert!(!validate(&doc(&command, ComponentKind::Command)).passed());
        assert!(validate(&doc(&agent, ComponentKind::Agent)).passed());
    }
}

#[test]
fn current_documents_plan_nothing() {
    let config = EngineConfig::default();
    for (text, kind) in [
        ("---\nname: a\ndescription: d\n---\n", ComponentKind::Agent),
        ("---\nname: s\ndescription: d\n---\n", ComponentKind::Skill),
        ("---\ndescription: d\n---\nBody\n", ComponentKind::Command),
        (r#"{"hooks":{}}"#, ComponentKind::Hook),
    ] {
        let d = doc(text, kind);
        assert_eq!(detect_version(&d), SchemaVersion::Current);
        assert!(plan(&d, &config).is_empty(), "{kind}");
    }
}

#[test]
fn backup_exists_and_predates_rewrite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands").join("deploy.md");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        "---\ndescription: Deploy\ntools: Bash\nmodel: opus\n---\nDeploy.\n",
    )
    .unwrap();

    let config = EngineConfig::default();
    let doc = read_document(&path, None).unwrap();
    let p = plan(&doc, &config);
    let outcome = execute(&path, &doc, &p, &Approval::AutomaticOnly, &config).unwrap();
    assert_eq!(outcome.applied, vec!["rename-tools"]);

    let backup = outcome.backup.unwrap();
    assert!(backup.exists());
    let backup_time = fs::metadata(&backup).unwrap().modified().unwrap();
    let rewritten_time = fs::metadata(&path).unwrap().modified().unwrap();
    assert!(backup_time <= rewritten_time);
    assert!(fs::read_to_string(&path)
        .unwrap()
        .contains("allowed-tools: Bash"));
}
