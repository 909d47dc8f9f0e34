use docrepo::common::Value;
use docrepo::errors::ErrorKind;
use docrepo::mapping::Entity;
use docrepo::predicate::{all, by_id, field, id};
use docrepo::repository::{LiveRepository, RepositoryProvider};
use docrepo::store::{DocumentCollection, DocumentStore, Filter, FindOptions, ReturnDocument};
use docrepo::update::Updates;
use docrepo_int_test::test_util::{create_store, post, run_on_backends, Note, Post};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_increments_accumulate() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(1, "a", 1), &token).await?;

        let updates = Updates::new().increment("counter", 2).increment("counter", 1);
        assert_eq!(notes.update_one(&by_id(1), &updates, &token).await?, 1);

        let found = notes.find_one(&by_id(1), &token).await?;
        assert_eq!(found.map(|note| note.counter), Some(4));
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_pull_of_absent_value_changes_nothing() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        let mut stored = post("lists", 0);
        stored.history = vec![1, 2, 1];
        posts.insert_one(&stored, &token).await?;

        let absent = Updates::new().pull("history", 7);
        assert_eq!(posts.update_one(&id().eq(stored.id), &absent, &token).await?, 0);
        assert_eq!(posts.find_one(&id().eq(stored.id), &token).await?, Some(stored.clone()));

        let present = Updates::new().pull("history", 1);
        assert_eq!(posts.update_one(&id().eq(stored.id), &present, &token).await?, 1);
        assert_eq!(posts.update_one(&id().eq(stored.id), &present, &token).await?, 0);

        let found = posts.find_one(&id().eq(stored.id), &token).await?;
        assert_eq!(found.map(|post| post.history), Some(vec![2]));
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_set_push_and_pull_apply_in_order() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        let stored = post("order", 10);
        posts.insert_one(&stored, &token).await?;

        let updates = Updates::new()
            .pull("history", 5)
            .push("history", 5)
            .push("history", 6)
            .increment("counter", 1)
            .set("counter", 1)
            .set("text", "ordered");
        posts.update_one(&id().eq(stored.id), &updates, &token).await?;

        let found = posts.find_one(&id().eq(stored.id), &token).await?;
        let found = found.expect("post exists");
        assert_eq!(found.text, "ordered");
        assert_eq!(found.counter, 2);
        assert_eq!(found.history, vec![6]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_update_many_counts_only_changed_records() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        let batch = vec![
            Note::new(1, "keep", 1),
            Note::new(2, "done", 2),
            Note::new(3, "keep", 3),
        ];
        notes.insert_many(&batch, &token).await?;

        let updates = Updates::new().set("text", "done");
        assert_eq!(notes.update_many(&all(), &updates, &token).await?, 2);
        assert_eq!(notes.update_many(&all(), &updates, &token).await?, 0);
        assert_eq!(
            notes.update_many(&field("counter").gt(10), &updates, &token).await?,
            0
        );
        assert_eq!(
            notes
                .count_documents(Some(&field("text").eq("done")), &token)
                .await?,
            3
        );
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_update_one_touches_a_single_record() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes
            .insert_many(&[Note::new(1, "x", 0), Note::new(2, "x", 0)], &token)
            .await?;

        let updates = Updates::new().increment("counter", 5);
        assert_eq!(notes.update_one(&field("text").eq("x"), &updates, &token).await?, 1);
        assert_eq!(
            notes.find_all(None, &token).await?,
            vec![Note::new(1, "x", 5), Note::new(2, "x", 0)]
        );
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_invalid_update_descriptors_are_rejected() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(1, "a", 1), &token).await?;

        let err = notes
            .update_one(&by_id(1), &Updates::new(), &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let err = notes
            .update_many(&all(), &Updates::new().set("id", 9), &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        let err = notes
            .update_one(&by_id(1), &Updates::new().set("title", "b"), &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        let err = notes
            .update_one(&by_id(1), &Updates::new().increment("text", 1), &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        assert_eq!(notes.find_all(None, &token).await?, vec![Note::new(1, "a", 1)]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_find_one_and_update_returns_requested_image() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(1, "a", 1), &token).await?;
        let updates = Updates::new().increment("counter", 1);

        let before = notes
            .find_one_and_update(&by_id(1), &updates, ReturnDocument::Before, &token)
            .await?;
        assert_eq!(before, Some(Note::new(1, "a", 1)));

        let after = notes
            .find_one_and_update(&by_id(1), &updates, ReturnDocument::After, &token)
            .await?;
        assert_eq!(after, Some(Note::new(1, "a", 3)));

        let missing = notes
            .find_one_and_update(&by_id(2), &updates, ReturnDocument::After, &token)
            .await?;
        assert_eq!(missing, None);
        assert_eq!(notes.count_documents(None, &token).await?, 1);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_upsert_one_inserts_then_updates() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        let updates = Updates::new()
            .increment("counter", 2)
            .set_on_insert("history", vec![9]);

        let outcome = posts
            .upsert_one(&field("text").eq("fresh"), &updates, &token)
            .await?;
        assert!(outcome.is_inserted());
        assert_eq!(outcome.matched_count, 0);
        let upserted_id = outcome.upserted_id.clone().unwrap_or(Value::Null);
        assert!(matches!(upserted_id, Value::ObjectId(_)));

        let created = posts.find_one(&id().eq(upserted_id.clone()), &token).await?;
        let created = created.expect("upserted post exists");
        assert_eq!(created.text, "fresh");
        assert_eq!(created.counter, 2);
        assert_eq!(created.history, vec![9]);

        let outcome = posts
            .upsert_one(&field("text").eq("fresh"), &updates, &token)
            .await?;
        assert!(!outcome.is_inserted());
        assert_eq!((outcome.matched_count, outcome.modified_count), (1, 1));

        let updated = posts.find_one(&id().eq(upserted_id), &token).await?;
        let updated = updated.expect("post still exists");
        assert_eq!(updated.counter, 4);
        assert_eq!(updated.history, vec![9]);
        assert_eq!(posts.count_documents(None, &token).await?, 1);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_upsert_one_keeps_pinned_identifier() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        let updates = Updates::new().set("text", "pinned").set_on_insert("counter", 7);

        let outcome = notes.upsert_one(&by_id(12), &updates, &token).await?;
        assert_eq!(outcome.upserted_id, Some(Value::I32(12)));
        assert_eq!(
            notes.find_one(&by_id(12), &token).await?,
            Some(Note::new(12, "pinned", 7))
        );
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_update_entity_sets_every_mapped_member() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(1, "a", 1), &token).await?;

        assert_eq!(notes.update_entity(&Note::new(1, "b", 2), &token).await?, 1);
        assert_eq!(notes.update_entity(&Note::new(1, "b", 2), &token).await?, 0);
        assert_eq!(notes.update_entity(&Note::new(5, "c", 3), &token).await?, 0);
        assert_eq!(notes.find_all(None, &token).await?, vec![Note::new(1, "b", 2)]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_update_and_upsert_entities_in_bulk() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes
            .insert_many(&[Note::new(1, "a", 1), Note::new(2, "b", 2)], &token)
            .await?;

        let changes = vec![
            Note::new(1, "a", 10),
            Note::new(2, "b", 2),
            Note::new(3, "c", 3),
        ];
        assert_eq!(notes.update_entities(&changes, &token).await?, 1);
        assert_eq!(notes.count_documents(None, &token).await?, 2);

        let changes = vec![Note::new(2, "b", 20), Note::new(3, "c", 3)];
        assert_eq!(notes.upsert_entities(&changes, &token).await?, 2);
        assert_eq!(
            notes.find_all(None, &token).await?,
            vec![Note::new(1, "a", 10), Note::new(2, "b", 20), Note::new(3, "c", 3)]
        );

        assert_eq!(notes.upsert_entities(&[], &token).await?, 0);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_upserted_record_holds_every_member() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        let outcome = notes
            .upsert_one(&by_id(7), &Updates::new().set("text", "sparse"), &token)
            .await?;
        assert!(outcome.is_inserted());

        let created = notes.find_one(&by_id(7), &token).await?;
        let created = created.expect("upserted note exists");
        assert_eq!(created, Note::new(7, "sparse", 0));

        // writing back what was read changes nothing
        assert_eq!(notes.replace_one(&created, false, &token).await?, 0);
        assert_eq!(notes.update_entity(&created, &token).await?, 0);
        let unchanged = Updates::new().set("counter", 0);
        assert_eq!(notes.update_one(&by_id(7), &unchanged, &token).await?, 0);

        let incremented = Updates::new().increment("counter", 1);
        assert_eq!(notes.update_one(&by_id(7), &incremented, &token).await?, 1);
        assert_eq!(
            notes.find_one(&by_id(7), &token).await?,
            Some(Note::new(7, "sparse", 1))
        );
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_upsert_with_pull_and_push_defaults_the_rest() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        let pulled = Updates::new().pull("history", 3);
        posts.upsert_one(&field("text").eq("pulled"), &pulled, &token).await?;
        let pushed = Updates::new().push("history", 5);
        posts.upsert_one(&field("text").eq("pushed"), &pushed, &token).await?;

        let created = posts.find_one(&field("text").eq("pulled"), &token).await?;
        let created = created.expect("pulled post exists");
        assert!(created.history.is_empty());
        assert_eq!(created.counter, 0);
        assert_eq!(posts.replace_one(&created, false, &token).await?, 0);

        let created = posts.find_one(&field("text").eq("pushed"), &token).await?;
        let created = created.expect("pushed post exists");
        assert_eq!(created.history, vec![5]);
        assert_eq!(posts.replace_one(&created, false, &token).await?, 0);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_live_upsert_stores_defaults_of_unset_members() {
    let store = create_store::<Note>(&[], None).await.unwrap();
    let notes = LiveRepository::<Note>::new(&store).unwrap();
    let token = CancellationToken::new();

    let updates = Updates::new().increment("counter", 2);
    notes.upsert_one(&by_id(3), &updates, &token).await.unwrap();

    let collection = store.collection(&Note::collection_name());
    let documents = collection
        .find(&Filter::All, &FindOptions::new(), &token)
        .await
        .unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].get("_id"), Some(&Value::I32(3)));
    assert_eq!(documents[0].get("text"), Some(&Value::from("")));
    assert_eq!(documents[0].get("counter"), Some(&Value::I32(2)));
}

#[tokio::test]
async fn test_increment_overflow_is_rejected() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes.insert_one(&Note::new(1, "max", i32::MAX), &token).await?;

        let updates = Updates::new().increment("counter", 1);
        let err = notes.update_one(&by_id(1), &updates, &token).await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
        let updates = Updates::new().increment("counter", 1i64);
        let err = notes.update_one(&by_id(1), &updates, &token).await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        assert_eq!(
            notes.find_one(&by_id(1), &token).await?,
            Some(Note::new(1, "max", i32::MAX))
        );
        Ok(())
    })
    .await;
}
