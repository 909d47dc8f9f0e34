use docrepo::predicate::{all, field, id, id_in};
use docrepo_int_test::test_util::{generate_post, generate_posts, run_on_backends, Note, Post};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_delete_many_by_identifiers() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        let first = generate_post();
        let second = generate_post();
        let other = generate_post();
        posts
            .insert_many(&[first.clone(), other.clone(), second.clone()], &token)
            .await?;

        let both = id_in(vec![first.id, second.id]);
        assert_eq!(posts.delete_many(&both, &token).await?, 2);
        assert!(posts.find_many(&both, 0, 10, None, &token).await?.is_empty());
        assert_eq!(posts.find_all(None, &token).await?, vec![other]);
        assert_eq!(posts.delete_many(&both, &token).await?, 0);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_delete_one_removes_first_match_only() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        notes
            .insert_many(
                &[Note::new(1, "x", 1), Note::new(2, "x", 2), Note::new(3, "y", 3)],
                &token,
            )
            .await?;

        assert_eq!(notes.delete_one(&field("text").eq("x"), &token).await?, 1);
        assert_eq!(
            notes.find_all(None, &token).await?,
            vec![Note::new(2, "x", 2), Note::new(3, "y", 3)]
        );
        assert_eq!(notes.delete_one(&field("text").eq("z"), &token).await?, 0);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_delete_many_everything() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        posts.insert_many(&generate_posts(4), &token).await?;

        assert_eq!(posts.delete_many(&all(), &token).await?, 4);
        assert_eq!(posts.count_documents(None, &token).await?, 0);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_find_one_and_delete() {
    run_on_backends::<Post, _, _>(&[], |_, posts| async move {
        let token = CancellationToken::new();
        let post = generate_post();
        posts.insert_one(&post, &token).await?;

        let removed = posts.find_one_and_delete(&id().eq(post.id), &token).await?;
        assert_eq!(removed, Some(post.clone()));
        assert_eq!(posts.find_one_and_delete(&id().eq(post.id), &token).await?, None);
        assert_eq!(posts.count_documents(None, &token).await?, 0);
        Ok(())
    })
    .await;
}
