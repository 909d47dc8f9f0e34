use docrepo::errors::ErrorKind;
use docrepo::predicate::{all, and, by_id, constant, field, id, id_in, not, or, value_equals, CompareOp};
use docrepo::repository::{to_skip, OrderBy, Repository};
use docrepo_int_test::test_util::{run_on_backends, Note};
use tokio_util::sync::CancellationToken;

async fn seed(notes: &Repository<Note>, token: &CancellationToken) -> docrepo::errors::RepoResult<()> {
    let batch = vec![
        Note::new(1, "alpha", 5),
        Note::new(2, "beta", 3),
        Note::new(3, "gamma", 1),
        Note::new(4, "delta", 4),
        Note::new(5, "alphabet", 2),
    ];
    notes.insert_many(&batch, token).await
}

fn ids(notes: &[Note]) -> Vec<i32> {
    notes.iter().map(|note| note.id).collect()
}

#[test]
fn test_skip_is_page_index_times_page_size() {
    assert_eq!(to_skip(0, 1).unwrap(), 0);
    assert_eq!(to_skip(3, 25).unwrap(), 75);
    assert!(to_skip(0, 0).unwrap_err().is_validation());
    assert!(to_skip(0, -5).unwrap_err().is_validation());
    assert!(to_skip(-1, 10).unwrap_err().is_validation());
    assert!(to_skip(i64::MAX, 2).unwrap_err().is_validation());
}

#[tokio::test]
async fn test_invalid_paging_is_rejected_before_the_backend() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        // a cancelled token proves the backend is never reached
        let token = CancellationToken::new();
        token.cancel();

        for (page_index, page_size) in [(0, 0), (0, -1), (-1, 10)] {
            let err = notes
                .find_many(&all(), page_index, page_size, None, &token)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);
        }
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_find_many_sorts_then_pages() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        seed(&notes, &token).await?;

        let ascending = OrderBy::ascending("counter");
        let page = notes.find_many(&all(), 1, 2, Some(&ascending), &token).await?;
        assert_eq!(ids(&page), vec![2, 4]);

        let last = notes.find_many(&all(), 2, 2, Some(&ascending), &token).await?;
        assert_eq!(ids(&last), vec![1]);

        let beyond = notes.find_many(&all(), 9, 2, Some(&ascending), &token).await?;
        assert!(beyond.is_empty());

        let descending = OrderBy::descending("text");
        let page = notes
            .find_many(&field("counter").lte(4), 0, 3, Some(&descending), &token)
            .await?;
        assert_eq!(ids(&page), vec![3, 4, 2]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_find_many_without_order_uses_insertion_order() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        seed(&notes, &token).await?;

        let page = notes.find_many(&all(), 1, 3, None, &token).await?;
        assert_eq!(ids(&page), vec![4, 5]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_sorting_by_unmapped_member_fails() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        seed(&notes, &token).await?;
        let err = notes
            .find_many(&all(), 0, 10, Some(&OrderBy::ascending("title")), &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FilterError);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_find_one_returns_first_match_or_none() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        seed(&notes, &token).await?;

        let found = notes.find_one(&field("counter").gte(4), &token).await?;
        assert_eq!(found, Some(Note::new(1, "alpha", 5)));
        assert_eq!(notes.find_one(&by_id(42), &token).await?, None);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_composite_predicates() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        seed(&notes, &token).await?;

        let found = notes
            .find_all(Some(&(field("counter").gt(1) & field("counter").lt(5))), &token)
            .await?;
        assert_eq!(ids(&found), vec![2, 4, 5]);

        let found = notes
            .find_all(Some(&or(vec![by_id(1), field("text").eq("gamma")])), &token)
            .await?;
        assert_eq!(ids(&found), vec![1, 3]);

        let found = notes
            .find_all(Some(&not(field("counter").in_array(vec![1, 2, 3]))), &token)
            .await?;
        assert_eq!(ids(&found), vec![1, 4]);

        let found = notes
            .find_all(
                Some(&and(vec![
                    id_in(vec![1, 2, 3]),
                    field("text").not_in_array(vec!["beta"]),
                ])),
                &token,
            )
            .await?;
        assert_eq!(ids(&found), vec![1, 3]);

        let found = notes.find_all(Some(&field("text").ne("alpha")), &token).await?;
        assert_eq!(ids(&found), vec![2, 3, 4, 5]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_constant_on_the_left_is_flipped() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        seed(&notes, &token).await?;

        // 3 < counter
        let predicate = constant::<Note, _>(3).compare(CompareOp::Lt, field("counter"));
        let found = notes.find_all(Some(&predicate), &token).await?;
        assert_eq!(ids(&found), vec![1, 4]);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_value_equals_matches_like_eq() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        seed(&notes, &token).await?;

        let helper = value_equals(field("text"), constant("delta"));
        let flipped = value_equals(constant(4), id());
        let plain = field::<Note>("text").eq("delta");

        assert_eq!(
            notes.find_all(Some(&helper), &token).await?,
            notes.find_all(Some(&plain), &token).await?
        );
        assert_eq!(ids(&notes.find_all(Some(&flipped), &token).await?), vec![4]);
        assert_eq!(notes.count_documents(Some(&!helper), &token).await?, 4);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_text_regex() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        seed(&notes, &token).await?;

        let found = notes.find_all(Some(&field("text").text_regex("^alpha")), &token).await?;
        assert_eq!(ids(&found), vec![1, 5]);

        let err = notes
            .find_all(Some(&field("text").text_regex("(unclosed")), &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FilterError);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_comparing_two_members_is_rejected() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        // rejected even when nothing is stored
        let predicate = field::<Note>("counter").compare(CompareOp::Gt, field("id"));
        let err = notes.find_all(Some(&predicate), &token).await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FilterError);

        let err = notes
            .count_documents(Some(&field("title").eq("x")), &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FilterError);
        Ok(())
    })
    .await;
}

#[tokio::test]
async fn test_constant_only_predicates() {
    run_on_backends::<Note, _, _>(&[], |_, notes| async move {
        let token = CancellationToken::new();
        seed(&notes, &token).await?;

        let always = constant::<Note, _>(1).compare(CompareOp::Eq, constant(1));
        let never = constant::<Note, _>(1).compare(CompareOp::Eq, constant(2));
        assert_eq!(notes.count_documents(Some(&always), &token).await?, 5);
        assert_eq!(notes.count_documents(Some(&never), &token).await?, 0);
        assert_eq!(
            notes
                .count_documents(Some(&(never | field("text").eq("beta"))), &token)
                .await?,
            1
        );
        Ok(())
    })
    .await;
}
