use docrepo::common::Value;
use docrepo::predicate::{field, id};
use docrepo::repository::{LiveRepository, RepositoryProvider};
use docrepo::store::{DocumentCollection, DocumentStore, Filter, FindOptions};
use docrepo::update::Updates;
use docrepo_int_test::test_util::{create_store, generate_post, run_on_backends, AuditedPost};
use tokio_util::sync::CancellationToken;

fn audited(author: &str) -> AuditedPost {
    AuditedPost {
        post: generate_post(),
        author: author.to_string(),
        revision: 1,
    }
}

#[tokio::test]
async fn test_inherited_members_are_queryable_and_updatable() {
    run_on_backends::<AuditedPost, _, _>(&["text"], |_, posts| async move {
        let token = CancellationToken::new();
        let first = audited("ada");
        let second = audited("grace");
        posts.insert_many(&[first.clone(), second.clone()], &token).await?;

        let found = posts.find_one(&id().eq(second.post.id), &token).await?;
        assert_eq!(found, Some(second.clone()));

        let found = posts
            .find_all(Some(&field("text").eq(first.post.text.clone())), &token)
            .await?;
        assert_eq!(found, vec![first.clone()]);

        let updates = Updates::new()
            .set("author", "lin")
            .increment("revision", 1i64)
            .push("history", 3);
        assert_eq!(posts.update_one(&field("author").eq("ada"), &updates, &token).await?, 1);

        let updated = posts.find_one(&id().eq(first.post.id), &token).await?;
        let updated = updated.expect("post exists");
        assert_eq!(updated.author, "lin");
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.post.history, vec![3]);
        assert_eq!(updated.post.counter, first.post.counter);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_members_are_stored_under_their_element_names() {
    let store = create_store::<AuditedPost>(&[], None).await.unwrap();
    let posts = LiveRepository::<AuditedPost>::new(&store).unwrap();
    let token = CancellationToken::new();
    let post = audited("ada");

    posts.insert_one(&post, &token).await.unwrap();

    let collection = store.collection("audited_posts");
    let documents = collection
        .find(&Filter::All, &FindOptions::new(), &token)
        .await
        .unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].get("author_name"), Some(&Value::from("ada")));
    assert_eq!(documents[0].get("_id"), Some(&Value::from(post.post.id)));
    assert!(documents[0].get("author").is_none());
}
