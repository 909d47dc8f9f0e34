//! # docrepo - Typed Document Repositories
//!
//! docrepo is a typed data-access layer over schemaless document collections. One
//! contract, [repository::RepositoryProvider], exposes insert, query, update,
//! replace and delete operations for an entity type, and two interchangeable
//! backends implement it with the same semantics:
//!
//! - **Live**: [repository::LiveRepository] translates predicates and update
//!   descriptors into commands of a document store collection.
//! - **In-memory**: [repository::MemoryRepository] evaluates predicates and applies
//!   updates directly on an in-process list, for fast deterministic tests.
//!
//! ## Key Features
//!
//! - **Typed predicates**: `field("counter").gt(3) & id().eq(post_id)`
//! - **Composable updates**: set, increment, set-on-insert, push and pull
//! - **Async with cancellation**: every operation takes a `CancellationToken`
//! - **Inspectable errors**: duplicate keys, validation failures and cancellations
//!   are distinct error kinds
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docrepo::predicate::{field, id};
//! use docrepo::repository::{MemoryRepository, Repository};
//! use docrepo::update::Updates;
//!
//! let posts: Repository<Post> = Repository::new(MemoryRepository::new()?);
//! let token = CancellationToken::new();
//!
//! posts.insert_one(&post, &token).await?;
//! posts
//!     .update_one(&id().eq(post.id), &Updates::new().increment("counter", 1), &token)
//!     .await?;
//! let popular = posts.find_all(Some(&field("counter").gte(10)), &token).await?;
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Values, documents, object ids and shared utilities
//! - [`errors`] - Error types and result definitions
//! - [`mapping`] - Entity mappings and the field/identity resolver
//! - [`predicate`] - Typed predicates, evaluation and filter translation
//! - [`update`] - Update descriptors
//! - [`store`] - Document store abstraction and the embedded store
//! - [`repository`] - The repository contract and its two backends

pub mod common;
pub mod errors;
pub mod mapping;
pub mod predicate;
pub mod repository;
pub mod store;
pub mod update;
