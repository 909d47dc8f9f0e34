use docrepo::errors::ErrorKind;
use docrepo::predicate::{all, by_id, field, id};
use docrepo::store::ReturnDocument;
use docrepo_int_test::test_util::{generate_post, generate_posts, run_on_backends, Note, Post};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_insert_then_find_by_id_round_trips() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        let mut post = generate_post();
        post.history = vec![3, 1, 2];
        post.duration = Duration::from_millis(1_500);

        posts.insert_one(&post, &token).await?;

        let found = posts.find_one(&id().eq(post.id), &token).await?;
        assert_eq!(found, Some(post));
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_insert_many_keeps_order() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        let batch = generate_posts(5);

        posts.insert_many(&batch, &token).await?;

        assert_eq!(posts.count_documents(None, &token).await?, 5);
        assert_eq!(posts.find_all(None, &token).await?, batch);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_insert_many_empty_is_noop() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_many(&[], &token).await?;
        assert_eq!(notes.count_documents(Some(&all()), &token).await?, 0);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_insert_many_stops_at_first_duplicate() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        let batch = vec![
            Note::new(1, "one", 1),
            Note::new(2, "two", 2),
            Note::new(1, "again", 3),
            Note::new(3, "three", 3),
        ];

        let err = notes.insert_many(&batch, &token).await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateKey);
        assert!(err.is_duplicate_key_on("_id"));

        let stored = notes.find_all(None, &token).await?;
        assert_eq!(stored, vec![Note::new(1, "one", 1), Note::new(2, "two", 2)]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_insert_with_taken_id_is_duplicate_key() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(7, "first", 0), &token).await?;

        let err = notes
            .insert_one(&Note::new(7, "second", 0), &token)
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(
            notes.find_one(&by_id(7), &token).await?,
            Some(Note::new(7, "first", 0))
        );
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_count_documents_with_predicate() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        for id in 1..=6 {
            notes.insert_one(&Note::new(id, "n", id * 10), &token).await?;
        }

        assert_eq!(notes.count_documents(None, &token).await?, 6);
        assert_eq!(
            notes
                .count_documents(Some(&field("counter").gt(30)), &token)
                .await?,
            3
        );
        assert_eq!(
            notes
                .count_documents(Some(&field("text").eq("missing")), &token)
                .await?,
            0
        );
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_durations_keep_whole_milliseconds() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        let mut post = generate_post();
        post.duration = Duration::from_micros(1_500);
        posts.insert_one(&post, &token).await?;

        let found = posts.find_one(&id().eq(post.id), &token).await?;
        let found = found.expect("post exists");
        assert_eq!(found.duration, Duration::from_millis(1));

        let mut replacement = found.clone();
        replacement.duration = Duration::from_nanos(2_999_999);
        let after = posts
            .find_one_and_replace(&replacement, false, ReturnDocument::After, &token)
            .await?;
        assert_eq!(after.map(|p| p.duration), Some(Duration::from_millis(2)));
        assert_eq!(
            posts.find_all(None, &token).await?,
            vec![Post {
                duration: Duration::from_millis(2),
                ..found
            }]
        );
        Ok(())
    })
    .await;
}
