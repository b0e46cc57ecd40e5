//! Reset modes and revert semantics, including the preconditions around
//! initial and merge commits.

mod common;

use common::init_repository;
use pretty_assertions::assert_eq;
use sctl::artifacts::core::error::{SourceError, as_source_error};
use sctl::commands::porcelain::reset::ResetMode;

#[tokio::test]
async fn test_soft_reset_moves_ref_only() {
    let repo = init_repository().await;
    repo.write_file("a.txt", "v1\n");
    let first = repo.commit_all("v1").await;
    repo.write_file("a.txt", "v2\n");
    repo.commit_all("v2").await;

    repo.repository
        .reset(Some("HEAD~1"), ResetMode::Soft)
        .await
        .unwrap();

    assert_eq!(repo.head(), first);
    // workspace and index untouched: the v2 content is still staged
    assert_eq!(repo.read_file("a.txt"), "v2\n");
    let report = repo.repository.status().await.unwrap();
    assert_eq!(report.index_modified, vec!["a.txt"]);
}

#[tokio::test]
async fn test_mixed_reset_repopulates_index_from_target_tree() {
    let repo = init_repository().await;
    repo.write_file("a.txt", "v1\n");
    let first = repo.commit_all("v1").await;
    repo.write_file("a.txt", "v2\n");
    repo.commit_all("v2").await;

    repo.repository
        .reset(Some("HEAD~1"), ResetMode::Mixed)
        .await
        .unwrap();

    assert_eq!(repo.head(), first);
    // the index now matches the target tree, so v2 shows as unstaged
    let report = repo.repository.status().await.unwrap();
    assert!(report.index_modified.is_empty());
    assert_eq!(report.workspace_modified, vec!["a.txt"]);
    assert_eq!(repo.read_file("a.txt"), "v2\n");

    let rows = common::index_rows(&repo).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].2, common::blob_oid_of("v1\n"));
}

#[tokio::test]
async fn test_hard_reset_restores_workspace() {
    let repo = init_repository().await;
    repo.write_file("a.txt", "v1\n");
    repo.write_file("sub/extra.txt", "keep\n");
    let first = repo.commit_all("v1").await;
    repo.write_file("a.txt", "v2\n");
    repo.write_file("new.txt", "added\n");
    repo.commit_all("v2").await;

    repo.repository
        .reset(Some("HEAD~1"), ResetMode::Hard)
        .await
        .unwrap();

    assert_eq!(repo.head(), first);
    assert_eq!(repo.read_file("a.txt"), "v1\n");
    assert_eq!(repo.read_file("sub/extra.txt"), "keep\n");
    assert!(!repo.file_exists("new.txt"));

    let report = repo.repository.status().await.unwrap();
    assert!(report.is_clean(), "unexpected report: {:?}", report);
}

#[tokio::test]
async fn test_revert_undoes_a_commit_with_a_new_commit() {
    let repo = init_repository().await;
    repo.write_file("keep.txt", "stays\n");
    repo.write_file("doomed.txt", "goes away\n");
    repo.commit_all("base").await;

    repo.write_file("doomed.txt", "changed\n");
    let to_revert = repo.commit_all("change doomed").await;

    let revert_oid = repo
        .repository
        .revert(&to_revert.to_hex())
        .await
        .unwrap();

    // a new commit on top of HEAD, restoring the earlier content
    assert_eq!(repo.head(), revert_oid);
    assert_eq!(repo.history_len(), 3);
    assert_eq!(repo.read_file("doomed.txt"), "goes away\n");
    assert_eq!(repo.read_file("keep.txt"), "stays\n");

    let commit = repo.repository.database().load_commit(&revert_oid).unwrap();
    assert!(commit.message().starts_with("Revert \"change doomed\""));
}

#[tokio::test]
async fn test_revert_materializes_nested_trees() {
    let repo = init_repository().await;
    repo.write_file("deep/nested/file.txt", "original\n");
    repo.commit_all("base").await;

    repo.write_file("deep/nested/file.txt", "modified\n");
    let to_revert = repo.commit_all("modify nested").await;

    repo.repository.revert(&to_revert.to_hex()).await.unwrap();

    assert_eq!(repo.read_file("deep/nested/file.txt"), "original\n");
}

#[tokio::test]
async fn test_revert_rejects_initial_commit() {
    let repo = init_repository().await;
    repo.write_file("a.txt", "x\n");
    let initial = repo.commit_all("initial").await;

    let err = repo.repository.revert(&initial.to_hex()).await.unwrap_err();

    assert!(matches!(
        as_source_error(&err),
        Some(SourceError::CannotRevertInitial { .. })
    ));
}

#[tokio::test]
async fn test_revert_rejects_merge_commit() {
    let repo = init_repository().await;
    repo.write_file("a.txt", "base\n");
    repo.commit_all("base").await;

    repo.repository.branch_create("side", None).unwrap();
    repo.write_file("b.txt", "master\n");
    repo.commit_all("on master").await;

    repo.repository.checkout("side").await.unwrap();
    repo.write_file("c.txt", "side\n");
    repo.commit_all("on side").await;

    repo.repository.checkout("master").await.unwrap();
    repo.repository
        .merge("side", Default::default())
        .await
        .unwrap();
    let merge_oid = repo.head();

    let err = repo.repository.revert(&merge_oid.to_hex()).await.unwrap_err();

    assert!(matches!(
        as_source_error(&err),
        Some(SourceError::CannotRevertMerge { .. })
    ));
}

#[tokio::test]
async fn test_revert_conflict_surfaces_stages() {
    let repo = init_repository().await;
    repo.write_file("x", "a\nb\nc\n");
    repo.commit_all("base").await;

    repo.write_file("x", "a\nB\nc\n");
    let to_revert = repo.commit_all("change b").await;

    // a later commit rewrites the same line, so the inverse cannot apply
    repo.write_file("x", "a\nB-later\nc\n");
    repo.commit_all("change b again").await;

    let err = repo.repository.revert(&to_revert.to_hex()).await.unwrap_err();

    assert!(matches!(
        as_source_error(&err),
        Some(SourceError::MergeConflict { .. })
    ));

    let rows = common::index_rows(&repo).await;
    let stages: Vec<u8> = rows.iter().map(|(_, stage, _)| *stage).collect();
    assert_eq!(stages, vec![1, 2, 3]);
}
