use docrepo::errors::{is_duplicate_key, ErrorKind};
use docrepo::predicate::{by_id, field};
use docrepo::repository::{MemoryRepository, RepositoryProvider};
use docrepo_int_test::test_util::{post, run_on_backends, Note, Post};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_second_insert_with_same_unique_value_is_reported() {
    run_on_backends::<Post, _, _>(&["text"], |_, posts| async move {
        let token = CancellationToken::new();
        let first = post("X", 1);
        let second = post("X", 2);

        assert!(!posts.insert_one_handle_duplicate(&first, &token).await?);
        assert!(posts.insert_one_handle_duplicate(&second, &token).await?);

        let stored = posts.find_all(Some(&field("text").eq("X")), &token).await?;
        assert_eq!(stored, vec![first]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_duplicate_unique_value_fails_insert_one() {
    run_on_backends::<Post, _, _>(&["text"], |_, posts| async move {
        let token = CancellationToken::new();
        posts.insert_one(&post("taken", 1), &token).await?;

        let err = posts.insert_one(&post("taken", 2), &token).await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);
        assert!(is_duplicate_key(&err, Some("text")));
        assert!(!is_duplicate_key(&err, Some("counter")));
        assert!(is_duplicate_key(&err, None));
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_update_into_taken_unique_value_fails() {
    run_on_backends::<Post, _, _>(&["text"], |_, posts| async move {
        let token = CancellationToken::new();
        let first = post("first", 1);
        let second = post("second", 1);
        posts.insert_many(&[first.clone(), second.clone()], &token).await?;

        let updates = docrepo::update::Updates::new().set("text", "first");
        let err = posts
            .update_one(&field("text").eq("second"), &updates, &token)
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key_on("text"));
        assert_eq!(posts.find_all(None, &token).await?, vec![first, second]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_non_duplicate_failures_are_not_swallowed() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        token.cancel();
        let err = notes
            .insert_one_handle_duplicate(&Note::new(1, "a", 1), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        Ok(())
    })
    .await;
}

// Without unique members the in-memory backend only sees a taken identifier or a
// structurally equal entity as a duplicate.
#[tokio::test]
async fn test_memory_structural_duplicate_detection() {
    let notes = MemoryRepository::<Note>::new().unwrap();
    let token = CancellationToken::new();
    let note = Note::new(1, "same", 1);

    assert!(!notes.insert_one_handle_duplicate(&note, &token).await.unwrap());
    assert!(notes.insert_one_handle_duplicate(&note, &token).await.unwrap());
    assert!(notes
        .insert_one_handle_duplicate(&Note::new(1, "other", 2), &token)
        .await
        .unwrap());

    // same text under another identifier is not a duplicate here
    assert!(!notes
        .insert_one_handle_duplicate(&Note::new(2, "same", 1), &token)
        .await
        .unwrap());
    assert_eq!(notes.len(), 2);
    assert_eq!(
        notes.find_one(&by_id(2), &token).await.unwrap(),
        Some(Note::new(2, "same", 1))
    );
}

#[tokio::test]
async fn test_memory_unique_fields_must_be_mapped() {
    let err = MemoryRepository::<Note>::new()
        .unwrap()
        .with_unique_fields(&["title"])
        .err()
        .unwrap();
    assert!(err.is_validation());
}
