use std::fs;
use std::path::Path;

use tempfile::tempdir;
use triage_core::batch::ToolSelection;
use zk_triage::{canonicalize_or_current, infer_target_id, parse_tool_selection, sha256_file};

#[test]
fn infer_target_id_uses_file_stem() {
    assert_eq!(infer_target_id(Path::new("/data/bugs/circuit.circom")), "circuit");
    assert_eq!(infer_target_id(Path::new("mimc_hash.circom")), "mimc_hash");
}

#[test]
fn infer_target_id_falls_back_when_missing() {
    assert_eq!(infer_target_id(Path::new("/")), "unnamed-target");
}

#[test]
fn parse_tool_selection_defaults_to_all() {
    assert!(matches!(parse_tool_selection(&[]), ToolSelection::All));
    assert!(matches!(parse_tool_selection(&["all".into()]), ToolSelection::All));
    assert!(matches!(
        parse_tool_selection(&["circomspect".into(), "ALL".into()]),
        ToolSelection::All
    ));
}

#[test]
fn parse_tool_selection_splits_commas_and_trims() {
    match parse_tool_selection(&["circomspect, picus".into(), "zkfuzz".into()]) {
        ToolSelection::Named(names) => {
            assert_eq!(names, vec!["circomspect", "picus", "zkfuzz"]);
        }
        ToolSelection::All => panic!("expected named selection"),
    }
}

#[test]
fn canonicalize_or_current_resolves_existing_relative_path() {
    let original = std::env::current_dir().expect("cwd");
    let tmp = tempdir().expect("tempdir");
    let subdir = tmp.path().join("nested");
    fs::create_dir_all(&subdir).expect("create nested");
    std::env::set_current_dir(tmp.path()).expect("chdir tmp");

    let result = canonicalize_or_current("nested").expect("canonicalize nested");
    assert_eq!(result, subdir.canonicalize().expect("canonicalize subdir"));

    std::env::set_current_dir(original).expect("restore cwd");
}

#[test]
fn sha256_file_matches_known_digest() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("circuit.circom");
    fs::write(&path, b"abc").expect("write");
    assert_eq!(
        sha256_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
