use crate::errors::RepoResult;
use crate::mapping::EntityMapping;

/// An application record type that can be stored in a repository.
///
/// Implementors declare their identifier and persisted members once; the mapping is
/// resolved lazily and cached per type by [crate::mapping::resolve].
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(Default, Clone, Debug, PartialEq)]
/// struct Post {
///     id: ObjectId,
///     text: String,
///     counter: i32,
/// }
///
/// impl Entity for Post {
///     fn mapping() -> RepoResult<EntityMapping<Self>> {
///         EntityMapping::builder("Post")
///             .id("id", |p: &Post| &p.id, |p: &mut Post| &mut p.id)
///             .field("text", |p: &Post| &p.text, |p: &mut Post| &mut p.text)
///             .field("counter", |p: &Post| &p.counter, |p: &mut Post| &mut p.counter)
///             .build()
///     }
/// }
/// ```
pub trait Entity: Default + Clone + Send + Sync + 'static {
    /// Name of the collection holding this entity type. Defaults to the type name.
    fn collection_name() -> String {
        let full_name = std::any::type_name::<Self>();
        let base = full_name.split('<').next().unwrap_or(full_name);
        base.rsplit("::").next().unwrap_or(base).to_string()
    }

    /// Builds the persistence mapping of this type.
    fn mapping() -> RepoResult<EntityMapping<Self>>;
}
