use docrepo::errors::ErrorKind;
use docrepo::predicate::{all, by_id};
use docrepo::repository::{LiveRepository, Repository};
use docrepo::store::ReturnDocument;
use docrepo::update::Updates;
use docrepo_int_test::test_util::{create_store, run_on_backends, Note};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_cancelled_token_fails_every_operation() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        notes.insert_one(&Note::new(1, "kept", 1), &CancellationToken::new()).await?;

        let token = CancellationToken::new();
        token.cancel();
        let note = Note::new(2, "b", 2);
        let updates = Updates::new().increment("counter", 1);

        let failures = vec![
            notes.insert_one(&note, &token).await.err(),
            notes.insert_many(&[note.clone()], &token).await.err(),
            notes.count_documents(None, &token).await.err(),
            notes.find_one(&by_id(1), &token).await.err(),
            notes.find_all(Some(&all()), &token).await.err(),
            notes.find_many(&all(), 0, 10, None, &token).await.err(),
            notes.find_one_and_delete(&by_id(1), &token).await.err(),
            notes
                .find_one_and_update(&by_id(1), &updates, ReturnDocument::After, &token)
                .await
                .err(),
            notes
                .find_one_and_replace(&note, true, ReturnDocument::After, &token)
                .await
                .err(),
            notes.update_one(&by_id(1), &updates, &token).await.err(),
            notes.update_many(&all(), &updates, &token).await.err(),
            notes.upsert_one(&by_id(2), &updates, &token).await.err(),
            notes.update_entity(&note, &token).await.err(),
            notes.update_entities(&[note.clone()], &token).await.err(),
            notes.upsert_entities(&[note.clone()], &token).await.err(),
            notes.delete_one(&by_id(1), &token).await.err(),
            notes.delete_many(&all(), &token).await.err(),
            notes.replace_one(&note, true, &token).await.err(),
            notes.replace_many(&[note.clone()], true, &token).await.err(),
        ];
        for (position, failure) in failures.into_iter().enumerate() {
            let err = failure.unwrap_or_else(|| panic!("operation {} was not cancelled", position));
            assert_eq!(err.kind(), &ErrorKind::Cancelled, "operation {}", position);
        }

        let untouched = notes.find_all(None, &CancellationToken::new()).await?;
        assert_eq!(untouched, vec![Note::new(1, "kept", 1)]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_cancellation_interrupts_a_slow_store() {
    let latency = Duration::from_millis(500);
    let store = create_store::<Note>(&[], Some(latency)).await.unwrap();
    let notes: Repository<Note> = Repository::new(LiveRepository::new(&store).unwrap());

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = notes
        .insert_one(&Note::new(1, "slow", 1), &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < latency);

    // the interrupted insert never reached the collection
    let count = notes.count_documents(None, &CancellationToken::new()).await.unwrap();
    assert_eq!(count, 0);
}
