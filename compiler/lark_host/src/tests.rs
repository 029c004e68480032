use super::*;
use pretty_assertions::assert_eq;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[test]
fn test_defaults() {
    let options = parse_args(&[]).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(options.workers, 4);
    assert_eq!(options.iterations, 1000);
    assert!(options.policy.is_none());
}

#[test]
fn test_file_and_count_options() {
    let options = parse_args(&args(&[
        "--policy",
        "p.json",
        "--workers=2",
        "--config",
        "c.json",
        "--iterations=5",
    ]))
    .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(options.policy.as_deref(), Some("p.json"));
    assert_eq!(options.config.as_deref(), Some("c.json"));
    assert_eq!((options.workers, options.iterations), (2, 5));
}

#[test]
fn test_bad_options_are_reported() {
    assert_eq!(
        parse_args(&args(&["--policy"])).err(),
        Some("--policy needs a file path".to_string())
    );
    assert_eq!(
        parse_args(&args(&["--workers=many"])).err(),
        Some("invalid worker count `many`".to_string())
    );
    assert!(parse_args(&args(&["--verbose"])).is_err());
}

#[test]
fn test_missing_files_fall_back_to_defaults() {
    assert!(load_policy(None).is_ok_and(|p| p.is_empty()));
    assert_eq!(load_config(None).ok(), Some(RuntimeConfig::default()));
    assert!(load_policy(Some("/nonexistent/policy.json")).is_err());
}
