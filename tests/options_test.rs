//! Integration tests for option schemas, command-line binding and saved documents

use buildrig::options::{
    tokenize, DocumentError, FormatMode, OptionKind, OptionSchema, OptionSpec, OptionValue,
    OptionsDocument, OptionsError, UnknownPolicy,
};
use std::sync::Arc;
use tempfile::TempDir;
use yare::parameterized;

fn schema() -> Arc<OptionSchema> {
    Arc::new(
        OptionSchema::new()
            .with(
                OptionSpec::new("Configuration", OptionKind::enumeration(["Debug", "Release"]))
                    .default_value(OptionValue::Enum("Release".to_string())),
            )
            .with(OptionSpec::new("Jobs", OptionKind::Int).default_value(OptionValue::Int(4)))
            .with(OptionSpec::new("Verbose", OptionKind::Bool))
            .with(OptionSpec::new("Message", OptionKind::String))
            .with(OptionSpec::new("Defines", OptionKind::StringList))
            .with(OptionSpec::new("Output", OptionKind::String).required()),
    )
}

fn args(line: &str) -> Vec<String> {
    tokenize(line).unwrap()
}

#[parameterized(
    unknown_option = { "--Output=out --Bogus=1", "Bogus" },
    positional = { "--Output=out stray", "stray" },
    bad_int = { "--Output=out --Jobs=many", "Jobs" },
    bad_enum = { "--Output=out --Configuration=Profile", "Configuration" },
    missing_value = { "--Output=out --Jobs", "Jobs" },
    missing_required = { "--Jobs=2", "Output" },
)]
fn test_strict_parse_errors_name_the_option(line: &str, expected: &str) {
    let err = schema().parse(&args(line), UnknownPolicy::Reject).unwrap_err();
    assert!(
        err.to_string().contains(expected),
        "'{}' should mention {}",
        err,
        expected
    );
}

#[parameterized(
    bare_flag = { "--Verbose", true },
    explicit_true = { "--Verbose=TRUE", true },
    numeric = { "--Verbose=0", false },
    yes = { "--verbose=yes", true },
    off = { "--VERBOSE=off", false },
)]
fn test_bool_spellings(flag: &str, expected: bool) {
    let options = schema()
        .parse(&args(&format!("--Output=out {}", flag)), UnknownPolicy::Reject)
        .unwrap();
    assert_eq!(options.get_bool("Verbose"), Some(expected));
}

#[parameterized(
    lower = { "debug" },
    upper = { "DEBUG" },
    declared = { "Debug" },
)]
fn test_enum_matches_case_insensitively(raw: &str) {
    let options = schema()
        .parse(
            &args(&format!("--Output=out --Configuration={}", raw)),
            UnknownPolicy::Reject,
        )
        .unwrap();
    assert_eq!(options.get_str("Configuration"), Some("Debug"));
}

#[test]
fn test_lenient_parse_skips_foreign_options() {
    let options = schema()
        .parse(
            &args("--Output=out --Platform x64 --jobs 8 extra"),
            UnknownPolicy::Ignore,
        )
        .unwrap();
    assert_eq!(options.get("Jobs"), Some(&OptionValue::Int(8)));
    assert_eq!(options.get_str("Output"), Some("out"));
}

#[test]
fn test_error_variants() {
    let schema = schema();
    assert_eq!(
        schema.parse(&args("--Jobs=2"), UnknownPolicy::Reject).unwrap_err(),
        OptionsError::MissingRequired("Output".to_string())
    );
    assert!(matches!(
        schema.parse(&args("--Output=o --Jobs=x"), UnknownPolicy::Reject),
        Err(OptionsError::InvalidValue { ref name, .. }) if name == "Jobs"
    ));
    assert_eq!(tokenize("--Message=\"open"), Err(OptionsError::UnterminatedQuote));
}

#[test]
fn test_simplify_keeps_required_and_changed_only() {
    let options = schema()
        .parse(
            &args("--Output=bin --Verbose --Defines=A --Defines=B --Configuration=release"),
            UnknownPolicy::Reject,
        )
        .unwrap();

    assert_eq!(
        options.to_args(FormatMode::Simplify),
        vec!["--Verbose=true", "--Defines=A", "--Defines=B", "--Output=bin"]
    );
    assert_eq!(options.changed(), vec!["Verbose", "Defines", "Output"]);

    let complete = options.to_args(FormatMode::Complete);
    assert_eq!(complete[0], "--Configuration=Release");
    assert!(complete.contains(&"--Message=".to_string()));
}

#[test]
fn test_quoted_values_survive_the_command_line() {
    let mut options = schema().parse(&args("--Output=out"), UnknownPolicy::Reject).unwrap();
    options
        .set("Message", OptionValue::String("say \"hi\" to C:\\temp".to_string()))
        .unwrap();

    let line = options.format(FormatMode::Simplify);
    let reparsed = schema().parse(&args(&line), UnknownPolicy::Reject).unwrap();
    assert_eq!(reparsed.get_str("Message"), Some("say \"hi\" to C:\\temp"));
    assert_eq!(reparsed, options);
}

#[test]
fn test_document_save_load_apply() {
    let dir = TempDir::new().unwrap();
    let path = OptionsDocument::default_path(dir.path(), "CppExample", "Compile");
    assert!(path.ends_with("CppExample/Compile.json"));

    let saved = schema()
        .parse(&args("--Output=dist --Jobs=16 --Defines=X"), UnknownPolicy::Reject)
        .unwrap();
    OptionsDocument::from_options("Compile", &saved).save(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["task"], "Compile");
    assert_eq!(json["options"][1]["name"], "Jobs");
    assert_eq!(json["options"][1]["type"], "int");
    assert_eq!(json["options"][1]["value"], 16);

    let document = OptionsDocument::load(&path).unwrap();
    let mut restored = schema().defaults();
    let applied = document.apply_to("Compile", &mut restored).unwrap();
    assert_eq!(applied, 6);
    assert_eq!(restored, saved);
}

#[test]
fn test_document_rejects_wrong_task_and_type() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("doc.json");
    std::fs::write(
        &path,
        r#"{
  "task": "Compile",
  "saved_at": "2024-05-01T10:00:00Z",
  "options": [
    { "name": "Removed", "type": "bool", "value": true },
    { "name": "Jobs", "type": "string", "value": "eight" }
  ]
}"#,
    )
    .unwrap();
    let document = OptionsDocument::load(&path).unwrap();

    let mut options = schema().defaults();
    assert!(matches!(
        document.apply_to("Package", &mut options),
        Err(DocumentError::TaskMismatch { .. })
    ));
    assert!(matches!(
        document.apply_to("Compile", &mut options),
        Err(DocumentError::TypeMismatch { ref name, .. }) if name == "Jobs"
    ));
    assert_eq!(options, schema().defaults());

    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(
        OptionsDocument::load(&path),
        Err(DocumentError::Format { .. })
    ));
}
