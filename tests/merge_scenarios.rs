//! Three-way merge scenarios: conflict materialization with markers and
//! stages, resolution strategies, squash merges, aborting, and concluding
//! a conflicted merge by committing.

mod common;

use common::{TestRepo, blob_oid_of, index_rows, init_repository, path};
use pretty_assertions::assert_eq;
use sctl::artifacts::core::error::{SourceError, as_source_error};
use sctl::artifacts::merge::threeway::ResolutionStrategy;
use sctl::commands::porcelain::merge::MergeOptions;
use sctl::artifacts::objects::object_id::ObjectId;

/// Base `x` = a/b/c, ours changes b to B1 on master, theirs to B2 on a
/// side branch; leaves HEAD on master. Returns the base commit digest.
async fn build_content_conflict(repo: &TestRepo) -> ObjectId {
    repo.write_file("x", "a\nb\nc\n");
    let base = repo.commit_all("base").await;

    repo.repository.branch_create("side", None).unwrap();

    repo.write_file("x", "a\nB1\nc\n");
    repo.commit_all("ours").await;

    repo.repository.checkout("side").await.unwrap();
    repo.write_file("x", "a\nB2\nc\n");
    repo.commit_all("theirs").await;

    repo.repository.checkout("master").await.unwrap();
    base
}

#[tokio::test]
async fn test_conflict_materializes_markers_and_stages() {
    let repo = init_repository().await;
    build_content_conflict(&repo).await;

    let err = repo
        .repository
        .merge("side", Default::default())
        .await
        .unwrap_err();

    match as_source_error(&err) {
        Some(SourceError::MergeConflict { paths }) => {
            assert_eq!(paths, &vec!["x".to_string()]);
        }
        other => panic!("expected MergeConflict, got {:?}", other),
    }

    // context lines a and c stay outside the markers
    use sctl::artifacts::merge::markers::has_conflict_markers;
    assert!(has_conflict_markers(repo.read_file("x").as_bytes()));
    assert_eq!(
        repo.read_file("x"),
        "a\n<<<<<<< ours\nB1\n=======\nB2\n>>>>>>> theirs\nc\n"
    );

    // stages 1/2/3 with the respective blob digests, and no stage 0
    let rows = index_rows(&repo).await;
    assert_eq!(
        rows,
        vec![
            ("x".to_string(), 1, blob_oid_of("a\nb\nc\n")),
            ("x".to_string(), 2, blob_oid_of("a\nB1\nc\n")),
            ("x".to_string(), 3, blob_oid_of("a\nB2\nc\n")),
        ]
    );

    // the merge state files exist while the merge is unresolved
    assert!(repo.temp.path().join(".source/MERGE_HEAD").exists());
    assert!(repo.temp.path().join(".source/ORIG_HEAD").exists());
}

#[tokio::test]
async fn test_resolving_and_committing_concludes_merge() {
    let repo = init_repository().await;
    build_content_conflict(&repo).await;
    let head_before = repo.head();

    let _ = repo.repository.merge("side", Default::default()).await;

    // resolve by hand and stage the result
    repo.write_file("x", "a\nB1 and B2\nc\n");
    repo.repository.add(&["x".to_string()]).await.unwrap();

    let merge_commit_oid = repo.repository.commit("").await.unwrap();

    let merge_commit = repo
        .repository
        .database()
        .load_commit(&merge_commit_oid)
        .unwrap();
    assert_eq!(merge_commit.parents().len(), 2);
    assert_eq!(merge_commit.parents()[0], head_before);
    assert!(!repo.repository.merge_state().in_progress());
}

#[tokio::test]
async fn test_commit_refuses_unresolved_conflicts() {
    let repo = init_repository().await;
    build_content_conflict(&repo).await;

    let _ = repo.repository.merge("side", Default::default()).await;

    let err = repo.repository.commit("too early").await.unwrap_err();
    assert!(matches!(
        as_source_error(&err),
        Some(SourceError::MergeConflict { .. })
    ));
}

#[tokio::test]
async fn test_merge_abort_restores_original_state() {
    let repo = init_repository().await;
    build_content_conflict(&repo).await;
    let head_before = repo.head();

    let _ = repo.repository.merge("side", Default::default()).await;
    assert!(repo.repository.merge_state().in_progress());

    repo.repository.merge_abort().await.unwrap();

    assert!(!repo.repository.merge_state().in_progress());
    assert_eq!(repo.head(), head_before);
    assert_eq!(repo.read_file("x"), "a\nB1\nc\n");

    let rows = index_rows(&repo).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, 0);
}

#[tokio::test]
async fn test_ours_strategy_keeps_our_side() {
    let repo = init_repository().await;
    build_content_conflict(&repo).await;

    repo.repository
        .merge(
            "side",
            MergeOptions {
                strategy: ResolutionStrategy::Ours,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(repo.read_file("x"), "a\nB1\nc\n");
    let head = repo.repository.database().load_commit(&repo.head()).unwrap();
    assert!(head.is_merge());
}

#[tokio::test]
async fn test_theirs_strategy_takes_their_side() {
    let repo = init_repository().await;
    build_content_conflict(&repo).await;

    repo.repository
        .merge(
            "side",
            MergeOptions {
                strategy: ResolutionStrategy::Theirs,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(repo.read_file("x"), "a\nB2\nc\n");
}

#[tokio::test]
async fn test_union_strategy_concatenates_sides() {
    let repo = init_repository().await;
    build_content_conflict(&repo).await;

    repo.repository
        .merge(
            "side",
            MergeOptions {
                strategy: ResolutionStrategy::Union,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(repo.read_file("x"), "a\nB1\nc\na\nB2\nc\n");

    // the union blob is staged at stage 0
    let rows = index_rows(&repo).await;
    assert_eq!(
        rows,
        vec![("x".to_string(), 0, blob_oid_of("a\nB1\nc\na\nB2\nc\n"))]
    );
}

#[tokio::test]
async fn test_ff_only_rejects_diverged_histories() {
    let repo = init_repository().await;
    build_content_conflict(&repo).await;

    let err = repo
        .repository
        .merge(
            "side",
            MergeOptions {
                ff_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        as_source_error(&err),
        Some(SourceError::NotFastForward { .. })
    ));
    // nothing was touched: no merge state, no stages
    assert!(!repo.repository.merge_state().in_progress());
    let rows = index_rows(&repo).await;
    assert!(rows.iter().all(|(_, stage, _)| *stage == 0));
}

#[tokio::test]
async fn test_squash_merge_has_one_parent() {
    let repo = init_repository().await;
    repo.write_file("shared.txt", "base\n");
    repo.commit_all("base").await;

    repo.repository.branch_create("side", None).unwrap();
    repo.repository.checkout("side").await.unwrap();
    repo.write_file("side.txt", "from side\n");
    repo.commit_all("side work").await;

    repo.repository.checkout("master").await.unwrap();
    repo.write_file("master.txt", "from master\n");
    let master_tip = repo.commit_all("master work").await;

    repo.repository
        .merge(
            "side",
            MergeOptions {
                squash: true,
                message: Some("squashed side".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let squashed = repo.repository.database().load_commit(&repo.head()).unwrap();
    assert_eq!(squashed.parents(), &[master_tip]);
    assert!(repo.file_exists("side.txt"));
    assert!(repo.file_exists("master.txt"));
}

#[tokio::test]
async fn test_non_overlapping_changes_merge_without_conflict() {
    let repo = init_repository().await;
    repo.write_file("doc.txt", "intro\nmiddle\noutro\n");
    repo.commit_all("base").await;

    repo.repository.branch_create("side", None).unwrap();
    repo.write_file("doc.txt", "INTRO\nmiddle\noutro\n");
    repo.commit_all("ours head").await;

    repo.repository.checkout("side").await.unwrap();
    repo.write_file("doc.txt", "intro\nmiddle\nOUTRO\n");
    repo.commit_all("theirs head").await;

    repo.repository.checkout("master").await.unwrap();
    let err = repo
        .repository
        .merge("side", Default::default())
        .await
        .unwrap_err();

    // digest-level modify/modify is a conflict by the resolution table,
    // but the line merge finds no contested region, so the working file
    // carries both edits and no markers
    assert!(matches!(
        as_source_error(&err),
        Some(SourceError::MergeConflict { .. })
    ));
    assert_eq!(repo.read_file("doc.txt"), "INTRO\nmiddle\nOUTRO\n");
}

#[tokio::test]
async fn test_delete_modify_conflict() {
    let repo = init_repository().await;
    repo.write_file("x", "base\n");
    repo.commit_all("base").await;

    repo.repository.branch_create("side", None).unwrap();

    // ours deletes x
    repo.remove_file("x");
    {
        let index = repo.repository.index();
        let mut index = index.lock().await;
        index.rehydrate().unwrap();
        index.remove(path("x")).unwrap();
        index.write_updates().unwrap();
    }
    repo.repository.commit("delete x").await.unwrap();

    // theirs modifies x
    repo.repository.checkout("side").await.unwrap();
    repo.write_file("x", "changed\n");
    repo.commit_all("modify x").await;

    repo.repository.checkout("master").await.unwrap();
    let err = repo
        .repository
        .merge("side", Default::default())
        .await
        .unwrap_err();

    assert!(matches!(
        as_source_error(&err),
        Some(SourceError::MergeConflict { .. })
    ));

    // stages: base and theirs only, ours side absent
    let rows = index_rows(&repo).await;
    let stages: Vec<u8> = rows.iter().map(|(_, stage, _)| *stage).collect();
    assert_eq!(stages, vec![1, 3]);
}
