use crate::errors::{ErrorKind, RepoError, RepoResult};
use crate::mapping::{Entity, EntityMapping};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::sync::Arc;

type ErasedMapping = Arc<dyn Any + Send + Sync>;

/// Process-wide cache of resolved mappings, one per entity type.
///
/// Population is write-once per type. Two callers resolving the same type at the
/// same time may both build the mapping; the first insert wins and both get it.
/// Failed resolutions are not cached.
static MAPPINGS: Lazy<DashMap<TypeId, ErasedMapping>> = Lazy::new(DashMap::new);

/// Returns the memoized mapping of `T`, building it on first use.
///
/// # Errors
///
/// Propagates the error of [Entity::mapping], typically
/// [ErrorKind::ValidationError] for a type without identifier mapping.
pub fn resolve<T: Entity>() -> RepoResult<Arc<EntityMapping<T>>> {
    let type_id = TypeId::of::<T>();

    // the shard guard must be released before building, which may resolve base types
    let cached = MAPPINGS.get(&type_id).map(|entry| entry.value().clone());
    if let Some(cached) = cached {
        return downcast::<T>(cached);
    }

    log::debug!("Resolving entity mapping of {}", std::any::type_name::<T>());
    let built: ErasedMapping = Arc::new(T::mapping()?);
    let stored = MAPPINGS
        .entry(type_id)
        .or_insert(built)
        .value()
        .clone();
    downcast::<T>(stored)
}

/// Checks whether a mapping of `T` has already been resolved.
pub fn is_resolved<T: Entity>() -> bool {
    MAPPINGS.contains_key(&TypeId::of::<T>())
}

fn downcast<T: Entity>(mapping: ErasedMapping) -> RepoResult<Arc<EntityMapping<T>>> {
    mapping.downcast::<EntityMapping<T>>().map_err(|_| {
        log::error!("Cached mapping has unexpected type for {}", std::any::type_name::<T>());
        RepoError::new(
            &format!(
                "Cached mapping has unexpected type for {}",
                std::any::type_name::<T>()
            ),
            ErrorKind::InternalError,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default, Clone)]
    struct Tag {
        id: i32,
        label: String,
    }

    impl Entity for Tag {
        fn mapping() -> RepoResult<EntityMapping<Self>> {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            EntityMapping::builder("Tag")
                .id("id", |t: &Tag| &t.id, |t: &mut Tag| &mut t.id)
                .field("label", |t: &Tag| &t.label, |t: &mut Tag| &mut t.label)
                .build()
        }
    }

    #[derive(Default, Clone)]
    struct Broken;

    impl Entity for Broken {
        fn mapping() -> RepoResult<EntityMapping<Self>> {
            EntityMapping::builder("Broken").build()
        }
    }

    #[test]
    fn test_resolve_is_memoized() {
        let first = resolve::<Tag>().unwrap();
        let builds = BUILDS.load(Ordering::SeqCst);
        let second = resolve::<Tag>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(is_resolved::<Tag>());
        assert_eq!(BUILDS.load(Ordering::SeqCst), builds);
    }

    #[test]
    fn test_concurrent_first_access_yields_one_mapping() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| resolve::<Tag>().unwrap()))
            .collect();
        let mappings: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for mapping in &mappings {
            assert!(Arc::ptr_eq(mapping, &mappings[0]));
        }
    }

    #[test]
    fn test_failure_is_not_cached() {
        let err = resolve::<Broken>().err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        assert!(!is_resolved::<Broken>());
    }
}
