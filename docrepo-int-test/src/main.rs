use docrepo::errors::RepoResult;
use docrepo::predicate::{all, field};
use docrepo::repository::{LiveRepository, MemoryRepository, Repository};
use docrepo::update::Updates;
use docrepo_int_test::test_util::{create_store, Note};
use tokio_util::sync::CancellationToken;

async fn stress(name: &str, repository: Repository<Note>, count: i32) -> RepoResult<()> {
    let token = CancellationToken::new();

    let start = std::time::Instant::now();
    for id in 0..count {
        let note = Note::new(id, &uuid::Uuid::new_v4().to_string(), id % 10);
        repository.insert_one(&note, &token).await?;
    }
    println!("[{}] Inserted {} records in {:?}", name, count, start.elapsed());

    let start = std::time::Instant::now();
    let updated = repository
        .update_many(&field("counter").lt(5), &Updates::new().increment("counter", 10), &token)
        .await?;
    println!("[{}] Updated {} records in {:?}", name, updated, start.elapsed());

    let start = std::time::Instant::now();
    let page = repository.find_many(&all(), 3, 100, None, &token).await?;
    println!("[{}] Read a page of {} records in {:?}", name, page.len(), start.elapsed());

    let start = std::time::Instant::now();
    let deleted = repository.delete_many(&field("counter").gte(10), &token).await?;
    println!("[{}] Deleted {} records in {:?}", name, deleted, start.elapsed());
    Ok(())
}

#[tokio::main]
async fn main() -> RepoResult<()> {
    println!("Starting stress test...");
    let count = 10_000;

    let store = create_store::<Note>(&[], None).await?;
    stress("live", Repository::new(LiveRepository::<Note>::new(&store)?), count).await?;
    stress("memory", Repository::new(MemoryRepository::<Note>::new()?), count).await
}
