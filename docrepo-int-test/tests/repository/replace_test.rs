use docrepo::errors::ErrorKind;
use docrepo::predicate::{by_id, field};
use docrepo::store::ReturnDocument;
use docrepo_int_test::test_util::{run_on_backends, Note};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_find_one_and_replace_returns_before_image() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(42, "original", 1), &token).await?;

        let before = notes
            .find_one_and_replace(&Note::new(42, "replaced", 2), false, ReturnDocument::Before, &token)
            .await?;
        assert_eq!(before, Some(Note::new(42, "original", 1)));

        let found = notes.find_one(&by_id(42), &token).await?;
        assert_eq!(found, Some(Note::new(42, "replaced", 2)));
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_find_one_and_replace_after_and_upsert() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(1, "a", 1), &token).await?;

        let after = notes
            .find_one_and_replace(&Note::new(1, "b", 2), false, ReturnDocument::After, &token)
            .await?;
        assert_eq!(after, Some(Note::new(1, "b", 2)));

        let missing = notes
            .find_one_and_replace(&Note::new(2, "c", 3), false, ReturnDocument::After, &token)
            .await?;
        assert_eq!(missing, None);
        assert_eq!(notes.count_documents(None, &token).await?, 1);

        let inserted_before = notes
            .find_one_and_replace(&Note::new(2, "c", 3), true, ReturnDocument::Before, &token)
            .await?;
        assert_eq!(inserted_before, None);

        let inserted_after = notes
            .find_one_and_replace(&Note::new(3, "d", 4), true, ReturnDocument::After, &token)
            .await?;
        assert_eq!(inserted_after, Some(Note::new(3, "d", 4)));
        assert_eq!(notes.count_documents(None, &token).await?, 3);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_replace_one_counts_modifications() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes
            .insert_many(&[Note::new(1, "a", 1), Note::new(2, "b", 2)], &token)
            .await?;

        assert_eq!(notes.replace_one(&Note::new(1, "z", 9), false, &token).await?, 1);
        assert_eq!(notes.replace_one(&Note::new(1, "z", 9), false, &token).await?, 0);
        assert_eq!(notes.replace_one(&Note::new(7, "y", 0), false, &token).await?, 0);
        assert_eq!(notes.replace_one(&Note::new(7, "y", 0), true, &token).await?, 0);

        // the replaced record keeps its position
        assert_eq!(
            notes.find_all(None, &token).await?,
            vec![Note::new(1, "z", 9), Note::new(2, "b", 2), Note::new(7, "y", 0)]
        );
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_replace_many_upserts_missing_records() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(1, "one", 1), &token).await?;

        let batch = vec![
            Note::new(1, "one, changed", 10),
            Note::new(2, "two", 2),
            Note::new(3, "three", 3),
        ];
        assert_eq!(notes.replace_many(&batch, true, &token).await?, 3);
        assert_eq!(notes.find_all(None, &token).await?, batch);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_replace_many_without_upsert_skips_missing_records() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(1, "one", 1), &token).await?;

        let batch = vec![Note::new(1, "uno", 1), Note::new(2, "two", 2)];
        assert_eq!(notes.replace_many(&batch, false, &token).await?, 1);
        assert_eq!(notes.find_all(None, &token).await?, vec![Note::new(1, "uno", 1)]);
        assert_eq!(notes.replace_many(&[], true, &token).await?, 0);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_replace_many_reports_failure_after_whole_batch() {
    run_on_backends::<Note, _, _>(&["text"], |_, notes| async move {
        let token = CancellationToken::new();
        notes
            .insert_many(&[Note::new(1, "a", 1), Note::new(2, "b", 2)], &token)
            .await?;

        let batch = vec![
            Note::new(1, "b", 1),
            Note::new(2, "b", 20),
            Note::new(3, "c", 3),
        ];
        let err = notes.replace_many(&batch, true, &token).await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);
        assert!(err.is_duplicate_key_on("text"));

        // the requests after the failing one still ran
        assert_eq!(
            notes.find_all(None, &token).await?,
            vec![Note::new(1, "a", 1), Note::new(2, "b", 20), Note::new(3, "c", 3)]
        );
        assert_eq!(
            notes.count_documents(Some(&field("text").eq("b")), &token).await?,
            1
        );
        Ok(())
    })
    .await;
}
