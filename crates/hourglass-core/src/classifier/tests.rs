use super::*;
use std::io::Write;

fn snapshot(json: &str) -> CategorySnapshot {
    CategorySnapshot::from_json_str(json).unwrap()
}

const RULES: &str = r##"{
    "categories": {
        "Work": {"color": "#3B82F6", "description": "Getting things done", "apps": ["code", "Terminal"]},
        "Browsers": {"color": "#F59E0B", "apps": ["firefox", "chrome"]},
        "Social": {"apps": ["discord"]}
    },
    "rules": {"default_category": "Other", "case_sensitive": false, "match_strategy": "partial"}
}"##;

// ============================================================================
// Resolution order tests
// ============================================================================

#[test]
fn test_exact_match_is_case_insensitive() {
    let rules = snapshot(RULES);
    let result = rules.classify_full("Firefox");
    assert_eq!(result.category, "Browsers");
    assert_eq!(result.source, ClassificationSource::Exact);
    assert_eq!(rules.classify("TERMINAL"), "Work");
}

#[test]
fn test_substring_match_without_exact_entry() {
    let rules = snapshot(r#"{"categories": {"Work": {"apps": ["code"]}, "Browsers": {"apps": ["firefox"]}}}"#);
    let result = rules.classify_full("CodeFire");
    assert_eq!(result.category, "Work");
    assert_eq!(result.pattern, Some("code"));
    assert_eq!(result.source, ClassificationSource::Substring);
}

#[test]
fn test_exact_entry_beats_substring_entry() {
    let rules = snapshot(r#"{"categories": {"Work": {"apps": ["code"]}, "Browsers": {"apps": ["codefire"]}}}"#);
    assert_eq!(rules.classify("codefire"), "Browsers");
    assert_eq!(rules.classify("vscode"), "Work");
}

#[test]
fn test_first_declared_substring_wins() {
    let rules = snapshot(r#"{"categories": {"Work": {"apps": ["code"]}, "Browsers": {"apps": ["codefire"]}}}"#);
    let result = rules.classify_full("CodeFire-Nightly");
    assert_eq!(result.category, "Work");
    assert_eq!(result.pattern, Some("code"));

    // A longer pattern declared later does not take over
    let rules = snapshot(r#"{"categories": {"Dev": {"apps": ["code"]}, "Media": {"apps": ["vlc", "barcode scanner"]}}}"#);
    assert_eq!(rules.classify("Barcode Scanner Pro"), "Dev");
    assert_eq!(rules.classify("VLC media player"), "Media");
}

#[test]
fn test_substring_order_follows_rule_file() {
    let rules = snapshot(r#"{"categories": {"First": {"apps": ["abc"]}, "Second": {"apps": ["xyz"]}}}"#);
    assert_eq!(rules.classify("xyz-abc"), "First");

    let reversed = snapshot(r#"{"categories": {"Second": {"apps": ["xyz"]}, "First": {"apps": ["abc"]}}}"#);
    assert_eq!(reversed.classify("xyz-abc"), "Second");

    let within = snapshot(r#"{"categories": {"Media": {"apps": ["player", "media player"]}, "Work": {"apps": ["media"]}}}"#);
    assert_eq!(within.classify("my media player"), "Media");
    assert_eq!(within.classify_full("my media player").pattern, Some("player"));
}

#[test]
fn test_unmatched_falls_back_to_other() {
    let rules = snapshot(RULES);
    let result = rules.classify_full("Spotify");
    assert_eq!(result.category, DEFAULT_CATEGORY);
    assert_eq!(result.source, ClassificationSource::Default);
    assert_eq!(result.pattern, None);
}

#[test]
fn test_empty_and_absent_names_are_other() {
    let rules = snapshot(RULES);
    assert_eq!(rules.classify(""), "Other");
    assert_eq!(rules.classify_optional(None), "Other");
    assert_eq!(rules.classify_optional(Some("discord")), "Social");
}

#[test]
fn test_empty_pattern_is_ignored() {
    let rules = snapshot(r#"{"categories": {"Everything": {"apps": ["", "  "]}}}"#);
    assert_eq!(rules.classify("anything"), "Other");
    assert_eq!(rules.pattern_count(), 0);
}

#[test]
fn test_later_declaration_of_pattern_wins() {
    let rules = snapshot(r#"{"categories": {"Work": {"apps": ["slack"]}, "Social": {"apps": ["Slack"]}}}"#);
    assert_eq!(rules.classify("slack"), "Social");
    assert_eq!(rules.pattern_count(), 1);
}

// ============================================================================
// Snapshot contents tests
// ============================================================================

#[test]
fn test_categories_include_other_and_defaults() {
    let rules = snapshot(RULES);
    let names: Vec<&str> = rules.categories().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Work", "Browsers", "Social", "Other"]);

    let social = &rules.categories()[2];
    assert_eq!(social.color, DEFAULT_COLOR);
    assert_eq!(social.description, "");
}

#[test]
fn test_mappings_are_lowercased_and_sorted() {
    let rules = snapshot(RULES);
    let mappings = rules.mappings();
    let apps: Vec<&str> = mappings.iter().map(|m| m.app_name.as_str()).collect();
    assert_eq!(apps, vec!["chrome", "code", "discord", "firefox", "terminal"]);
}

#[test]
fn test_malformed_json_is_an_error() {
    assert!(CategorySnapshot::from_json_str("{not json").is_err());
    assert!(CategorySnapshot::from_json_str(r#"{"categories": {"Work": {"apps": [1, 2]}}}"#).is_err());
}

// ============================================================================
// Resolver tests
// ============================================================================

#[test]
fn test_resolver_loads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{RULES}").unwrap();

    let resolver = CategoryResolver::new(file.path());
    let rules = resolver.load();
    assert_eq!(rules.classify("firefox"), "Browsers");
    assert_eq!(rules.pattern_count(), 5);
}

#[test]
fn test_resolver_missing_file_is_soft() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = CategoryResolver::new(dir.path().join("missing.json"));
    let rules = resolver.load();
    assert_eq!(rules.classify("firefox"), "Other");
    assert_eq!(rules.categories().len(), 1);
}

#[test]
fn test_resolver_corrupt_file_is_soft() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{\"categories\": [").unwrap();

    let rules = CategoryResolver::new(file.path()).load();
    assert_eq!(rules.classify("firefox"), "Other");
    assert_eq!(rules.pattern_count(), 0);
}
