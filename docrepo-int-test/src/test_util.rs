use chrono::{DateTime, Utc};
use docrepo::common::ObjectId;
use docrepo::errors::RepoResult;
use docrepo::mapping::{Entity, EntityMapping};
use docrepo::repository::{LiveRepository, MemoryRepository, Repository};
use docrepo::store::{EmbeddedStore, StoreConfig};
use fake::faker::chrono::en::DateTimeBetween;
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Post {
    pub id: ObjectId,
    pub text: String,
    pub counter: i32,
    pub history: Vec<i32>,
    pub created_time_utc: DateTime<Utc>,
    pub duration: Duration,
}

impl Entity for Post {
    fn mapping() -> RepoResult<EntityMapping<Self>> {
        EntityMapping::builder("Post")
            .id("id", |p: &Post| &p.id, |p: &mut Post| &mut p.id)
            .field("text", |p: &Post| &p.text, |p: &mut Post| &mut p.text)
            .field("counter", |p: &Post| &p.counter, |p: &mut Post| &mut p.counter)
            .field("history", |p: &Post| &p.history, |p: &mut Post| &mut p.history)
            .field(
                "created_time_utc",
                |p: &Post| &p.created_time_utc,
                |p: &mut Post| &mut p.created_time_utc,
            )
            .field("duration", |p: &Post| &p.duration, |p: &mut Post| &mut p.duration)
            .build()
    }
}

/// An entity keyed by a caller-chosen integer.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Note {
    pub id: i32,
    pub text: String,
    pub counter: i32,
}

impl Note {
    pub fn new(id: i32, text: &str, counter: i32) -> Self {
        Note {
            id,
            text: text.to_string(),
            counter,
        }
    }
}

impl Entity for Note {
    fn mapping() -> RepoResult<EntityMapping<Self>> {
        EntityMapping::builder("Note")
            .id("id", |n: &Note| &n.id, |n: &mut Note| &mut n.id)
            .field("text", |n: &Note| &n.text, |n: &mut Note| &mut n.text)
            .field("counter", |n: &Note| &n.counter, |n: &mut Note| &mut n.counter)
            .build()
    }
}

/// A post with audit members, mapping the post members through `inherit`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuditedPost {
    pub post: Post,
    pub author: String,
    pub revision: i64,
}

impl Entity for AuditedPost {
    fn collection_name() -> String {
        "audited_posts".to_string()
    }

    fn mapping() -> RepoResult<EntityMapping<Self>> {
        EntityMapping::builder("AuditedPost")
            .inherit(|a: &AuditedPost| &a.post, |a: &mut AuditedPost| &mut a.post)
            .field_with_element_name(
                "author",
                "author_name",
                |a: &AuditedPost| &a.author,
                |a: &mut AuditedPost| &mut a.author,
            )
            .field("revision", |a: &AuditedPost| &a.revision, |a: &mut AuditedPost| &mut a.revision)
            .build()
    }
}

/// The repository backends every scenario runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Live,
    Memory,
}

pub const ALL_BACKENDS: [Backend; 2] = [Backend::Live, Backend::Memory];

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Live => write!(f, "live"),
            Backend::Memory => write!(f, "memory"),
        }
    }
}

/// Opens an embedded store on a fresh database, with a unique index on every
/// named member of `T`'s collection.
pub async fn create_store<T: Entity>(
    unique_fields: &[&str],
    latency: Option<Duration>,
) -> RepoResult<EmbeddedStore> {
    let collection_name = T::collection_name();
    let mut builder = StoreConfig::builder().database_name(&random_database_name());
    for field in unique_fields {
        builder = builder.unique_index(&collection_name, field);
    }
    if let Some(latency) = latency {
        builder = builder.latency(latency);
    }
    EmbeddedStore::connect(builder.build()?, &CancellationToken::new()).await
}

/// Builds an empty repository of `T` on `backend`, enforcing uniqueness of
/// `unique_fields` on both.
pub async fn create_repository<T: Entity>(
    backend: Backend,
    unique_fields: &[&str],
) -> RepoResult<Repository<T>> {
    match backend {
        Backend::Live => {
            let store = create_store::<T>(unique_fields, None).await?;
            Ok(Repository::new(LiveRepository::<T>::new(&store)?))
        }
        Backend::Memory => {
            let repository = MemoryRepository::<T>::new()?.with_unique_fields(unique_fields)?;
            Ok(Repository::new(repository))
        }
    }
}

/// Runs `test` once per backend on a fresh repository.
///
/// Tests run sequentially on the calling task. A failing backend panics with the
/// backend name and the error, so a report always says which backend diverged.
pub async fn run_on_backends<T, F, Fut>(unique_fields: &[&str], test: F)
where
    T: Entity,
    F: Fn(Backend, Repository<T>) -> Fut,
    Fut: Future<Output = RepoResult<()>>,
{
    for backend in ALL_BACKENDS {
        let start_time = Instant::now();
        let repository = match create_repository::<T>(backend, unique_fields).await {
            Ok(repository) => repository,
            Err(e) => panic!("[{}] Before run failed: {:?}", backend, e),
        };

        if let Err(e) = test(backend, repository).await {
            eprintln!("\n==================== TEST FAILED ====================");
            eprintln!("Backend: {} (took {:?})", backend, start_time.elapsed());
            eprintln!("Error: {:?}", e);
            eprintln!("=====================================================\n");
            panic!("[{}] Test failed: {}", backend, e);
        }
        log::debug!("[{}] passed in {:?}", backend, start_time.elapsed());
    }
}

pub fn random_database_name() -> String {
    format!("docrepo_{}", uuid::Uuid::new_v4().simple())
}

pub fn generate_post() -> Post {
    Post {
        id: ObjectId::new(),
        text: Sentence(3..8).fake(),
        counter: (0..100).fake(),
        history: vec![],
        created_time_utc: generate_time(),
        duration: Duration::from_millis((0..60_000u64).fake()),
    }
}

pub fn generate_posts(count: usize) -> Vec<Post> {
    (0..count).map(|_| generate_post()).collect()
}

pub fn post(text: &str, counter: i32) -> Post {
    Post {
        text: text.to_string(),
        counter,
        ..generate_post()
    }
}

fn generate_time() -> DateTime<Utc> {
    let start = DateTime::from_timestamp(1_600_000_000, 0).unwrap_or_default();
    let end = DateTime::from_timestamp(1_800_000_000, 0).unwrap_or_default();
    DateTimeBetween(start, end).fake()
}
