//! End-to-end repository scenarios: forge, gather, seal, switch, crash
//! recovery, and reference resolution.

use std::fs;
use std::path::Path;

use ivd_objects::{EntryMode, ObjectKind, Tree, TreeEntry};
use ivd_overwrite::OverwriteCategory;
use ivd_repo::{RepoError, Repository};
use ivd_store::ObjectStore;
use ivd_types::{Hash, Identity};

fn user() -> Identity {
    Identity::new("eitri", "eitri@forge.example").unwrap()
}

fn forge(dir: &Path) -> Repository {
    Repository::forge(dir, user()).unwrap()
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

#[test]
fn scenario_1_initial_seal() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());

    write(dir.path(), "a.txt", "hi\n");
    write(dir.path(), "sub/b.txt", "B\n");
    repo.gather(&["."]).unwrap();
    let outcome = repo.seal("first").unwrap();

    // Root seal with the expected deterministic tree hash.
    let seal = repo.history().unwrap()[0].1.clone();
    assert!(seal.parents.is_empty());
    let expected_tree = Tree::new(vec![
        TreeEntry::new(
            EntryMode::Regular,
            "a.txt",
            ObjectKind::Blob,
            Hash::blake3(b"hi\n"),
        ),
        TreeEntry::new(
            EntryMode::Regular,
            "sub/b.txt",
            ObjectKind::Blob,
            Hash::blake3(b"B\n"),
        ),
    ])
    .unwrap();
    assert_eq!(
        outcome.tree,
        Hash::blake3(&expected_tree.encode().unwrap())
    );

    assert_eq!(outcome.iteration, 1);
    assert!(!outcome.memorable_name.is_empty());
    assert_eq!(repo.head(), outcome.hash);
    assert_eq!(repo.head_of("main").unwrap(), outcome.hash);
    assert_eq!(
        repo.memorable_name_of(&outcome.hash),
        Some(outcome.memorable_name.as_str())
    );
}

#[test]
fn scenario_2_modify_and_seal() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    let first = repo.seal("first").unwrap();

    write(dir.path(), "a.txt", "hello\n");
    let report = repo.status().unwrap();
    assert_eq!(report.modified, vec!["a.txt".to_string()]);

    repo.gather(&["a.txt"]).unwrap();
    let second = repo.seal("second").unwrap();

    assert_eq!(second.iteration, 2);
    let seal = repo.load_history_seal(&second.hash);
    assert_eq!(seal.parents, vec![first.hash]);
    assert_ne!(second.tree, first.tree);
}

#[test]
fn scenario_3_switch_preserves_work() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    repo.seal("first").unwrap();

    // Staged-but-unsealed change, then hop to a fresh timeline.
    write(dir.path(), "a.txt", "WIP\n");
    repo.gather(&["a.txt"]).unwrap();
    repo.create_timeline("feature", "try something").unwrap();
    let outcome = repo.switch_timeline("feature").unwrap();

    assert!(outcome.conflicts.is_empty());
    assert_eq!(repo.current_timeline(), "feature");
    let heads: serde_json::Value = serde_json::from_str(
        &read(dir.path(), ".ivaldi/HEADS.json"),
    )
    .unwrap();
    assert_eq!(heads["current"], "feature");
    // The base matched, so the stash reapplied cleanly.
    assert_eq!(read(dir.path(), "a.txt"), "WIP\n");
}

#[test]
fn scenario_4_switch_with_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    repo.seal("first").unwrap();
    repo.create_timeline("feature", "").unwrap();

    write(dir.path(), "a.txt", "M1\n");
    repo.gather(&["a.txt"]).unwrap();
    repo.seal("main change").unwrap();

    repo.switch_timeline("feature").unwrap();
    write(dir.path(), "a.txt", "F1\n");
    repo.gather(&["a.txt"]).unwrap();
    repo.seal("feature change").unwrap();

    write(dir.path(), "a.txt", "LOCAL\n");
    let outcome = repo.switch_timeline("main").unwrap();

    // The switch completes despite the conflict.
    assert_eq!(repo.current_timeline(), "main");
    assert_eq!(outcome.conflicts, vec!["a.txt".to_string()]);
    assert_eq!(
        read(dir.path(), "a.txt"),
        "<<<<<<< target\nM1\n=======\nLOCAL\n>>>>>>> your_changes\n"
    );
}

#[test]
fn scenario_5_wal_recovery_completes_checkout() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    let s1 = repo.seal("on main").unwrap();
    repo.create_timeline("feature", "").unwrap();
    repo.switch_timeline("feature").unwrap();
    write(dir.path(), "a.txt", "F1\n");
    repo.gather(&["a.txt"]).unwrap();
    let s2 = repo.seal("on feature").unwrap();
    repo.switch_timeline("main").unwrap();
    assert_eq!(read(dir.path(), "a.txt"), "hi\n");

    let s1_tree = s1.tree;
    drop(repo);

    // Simulate a crash mid-switch: a stashed-phase record between the
    // source tree and the target seal, written by hand.
    let journal_dir = dir.path().join(".ivaldi/journal");
    fs::create_dir_all(&journal_dir).unwrap();
    fs::write(
        journal_dir.join("switch.json"),
        format!(
            "{{\"from_tree\":\"{}\",\"to_seal\":\"{}\",\"phase\":\"stashed\"}}",
            s1_tree, s2.hash
        ),
    )
    .unwrap();

    let repo = Repository::open(dir.path()).unwrap();
    // Recovery completed the checkout and cleared the journal.
    assert_eq!(read(dir.path(), "a.txt"), "F1\n");
    assert!(!journal_dir.join("switch.json").exists());
    assert_eq!(repo.current_timeline(), "feature");
}

#[test]
fn scenario_6_reference_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    let outcome = repo.seal("first").unwrap();

    assert_eq!(repo.resolve("#1").unwrap(), outcome.hash);
    assert_eq!(repo.resolve("main#1").unwrap(), outcome.hash);
    assert_eq!(repo.resolve(&outcome.memorable_name).unwrap(), outcome.hash);
    assert_eq!(repo.resolve(&outcome.hash.to_string()).unwrap(), outcome.hash);

    let err = repo.resolve("nonsense-that-does-not-exist").unwrap_err();
    assert!(matches!(err, RepoError::Resolve(_)));
}

#[test]
fn seal_requires_gathered_changes() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.status().unwrap();

    let err = repo.seal("nothing staged").unwrap_err();
    assert!(err.is_nothing_gathered());
}

#[test]
fn second_scan_after_seal_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    write(dir.path(), "sub/b.txt", "B\n");
    repo.gather(&["."]).unwrap();
    repo.seal("first").unwrap();

    let report = repo.status().unwrap();
    assert!(report.is_clean());
}

#[test]
fn reopen_preserves_state() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut repo = forge(dir.path());
        write(dir.path(), "a.txt", "hi\n");
        repo.gather(&["."]).unwrap();
        repo.seal("first").unwrap();
    }

    let mut repo = Repository::open(dir.path()).unwrap();
    assert_eq!(repo.current_timeline(), "main");
    assert_eq!(repo.iteration("main"), 1);
    assert!(!repo.head().is_zero());
    assert!(repo.status().unwrap().is_clean());
}

#[test]
fn amend_records_overwrite_and_keeps_original() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    let original = repo.seal("typo in mesage").unwrap();

    let (amended, record_id) = repo
        .amend(
            "typo in message",
            OverwriteCategory::Amend,
            "fix the seal message typo",
        )
        .unwrap();

    assert_ne!(amended.hash, original.hash);
    assert_eq!(repo.head(), amended.hash);

    // Both sides of the record stay retrievable.
    let records = repo.overwrite_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record_id);
    assert!(repo.objects().exists(&original.hash).unwrap());
    assert!(repo.objects().exists(&amended.hash).unwrap());

    // History now ends at the replacement.
    assert_eq!(repo.resolve("#-1").unwrap(), amended.hash);
}

#[test]
fn protected_seal_cannot_be_amended() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    let sealed = repo.seal("keep me").unwrap();
    repo.protect(sealed.hash).unwrap();

    let err = repo
        .amend("rewrite", OverwriteCategory::Amend, "should fail")
        .unwrap_err();
    assert!(matches!(err, RepoError::Overwrite(_)));
    assert_eq!(repo.head(), sealed.hash);
}

#[test]
fn gc_keeps_reachable_and_overwritten_drops_strays() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    let first = repo.seal("first").unwrap();
    let (amended, _) = repo
        .amend("first, amended", OverwriteCategory::Amend, "better wording")
        .unwrap();

    let stray = repo
        .objects()
        .put(b"never referenced by anything", ObjectKind::Blob)
        .unwrap();

    let report = repo.gc().unwrap();
    assert!(report.removed >= 1);
    assert!(!repo.objects().exists(&stray).unwrap());
    // The displaced original survives through its overwrite record.
    assert!(repo.objects().exists(&first.hash).unwrap());
    assert!(repo.objects().exists(&amended.hash).unwrap());
    assert!(repo.verify_objects().unwrap().is_empty());
}

#[test]
fn dedup_statistics_sees_shared_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    // Two files sharing a large common body should dedup below 2x.
    let body = "the same long line repeated\n".repeat(4000);
    write(dir.path(), "one.txt", &body);
    write(dir.path(), "two.txt", &format!("{body}trailer\n"));
    repo.gather(&["."]).unwrap();
    repo.seal("two similar files").unwrap();

    let stats = repo.dedup_statistics().unwrap();
    assert_eq!(stats.blobs, 2);
    assert!(stats.chunks > stats.unique_chunks);
    assert!(stats.unique_bytes < stats.total_bytes);
}

#[test]
fn shelve_and_unshelve_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    repo.seal("base").unwrap();

    write(dir.path(), "a.txt", "work in progress\n");
    repo.shelve("half-done").unwrap();
    // Shelving restored the sealed content.
    assert_eq!(read(dir.path(), "a.txt"), "hi\n");
    assert_eq!(repo.shelves().unwrap(), vec!["half-done".to_string()]);

    let conflicts = repo.unshelve("half-done").unwrap();
    assert!(conflicts.is_empty());
    assert_eq!(read(dir.path(), "a.txt"), "work in progress\n");
    assert!(repo.shelves().unwrap().is_empty());

    assert!(matches!(
        repo.unshelve("half-done"),
        Err(RepoError::ShelfNotFound(_))
    ));
}

#[test]
fn timeline_rules_at_the_facade() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "hi\n");
    repo.gather(&["."]).unwrap();
    repo.seal("first").unwrap();

    repo.create_timeline("feature", "").unwrap();
    assert!(matches!(
        repo.create_timeline("feature", ""),
        Err(RepoError::Timeline(_))
    ));
    assert!(matches!(
        repo.delete_timeline("main"),
        Err(RepoError::Timeline(_))
    ));

    repo.switch_timeline("feature").unwrap();
    assert!(matches!(
        repo.delete_timeline("feature"),
        Err(RepoError::Timeline(_))
    ));
    repo.switch_timeline("main").unwrap();
    repo.delete_timeline("feature").unwrap();
}

#[test]
fn switch_to_never_sealed_timeline_from_fresh_repo() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    // No seal yet; the new timeline gets an initial-snapshot head.
    write(dir.path(), "notes.txt", "keep me\n");
    repo.create_timeline("scratch", "").unwrap();
    let outcome = repo.switch_timeline("scratch").unwrap();
    assert!(outcome.conflicts.is_empty());
    assert_eq!(repo.current_timeline(), "scratch");
    // The untracked file survived the hop through the stash.
    assert_eq!(read(dir.path(), "notes.txt"), "keep me\n");

    let back = repo.switch_timeline("main").unwrap();
    assert!(back.conflicts.is_empty());
    assert_eq!(read(dir.path(), "notes.txt"), "keep me\n");
}

#[test]
fn gather_then_discard_then_gather_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let mut repo = forge(dir.path());
    write(dir.path(), "a.txt", "stable\n");
    write(dir.path(), "b.txt", "also stable\n");

    repo.gather(&["."]).unwrap();
    let summary = repo.diff_summary();
    assert_eq!(summary.added.len(), 2);

    repo.discard(&["."]).unwrap();
    assert!(repo.diff_summary().is_empty());

    repo.gather(&["."]).unwrap();
    let outcome = repo.seal("after churn").unwrap();
    assert_eq!(outcome.iteration, 1);
}

// Test-only helper: fetch a seal from the history walk by hash.
trait HistoryLookup {
    fn load_history_seal(&self, hash: &Hash) -> ivd_objects::Seal;
}

impl HistoryLookup for Repository {
    fn load_history_seal(&self, hash: &Hash) -> ivd_objects::Seal {
        self.history()
            .unwrap()
            .into_iter()
            .find(|(h, _)| h == hash)
            .map(|(_, seal)| seal)
            .expect("seal should be in history")
    }
}
