use crate::core::Value;

/// A record type that can be bulk-loaded.
///
/// There is no runtime reflection in Rust, so the type lists its own loadable
/// fields. Each field carries a getter producing the cell [`Value`] and,
/// for writable fields, a setter used by default-value injection. Fields left
/// out of [`fields`](Entity::fields) are simply never serialized, and
/// relation-valued fields (child collections) are not listed here at all;
/// they are declared on the [`EntityBuilder`](crate::EntityBuilder) directly.
///
/// # Examples
///
/// ```
/// use pgbulk::{Entity, FieldAccessor, Value};
/// use uuid::Uuid;
///
/// struct Device {
///     id: Uuid,
///     name: String,
/// }
///
/// impl Entity for Device {
///     fn entity_name() -> &'static str {
///         "Device"
///     }
///
///     fn fields() -> Vec<FieldAccessor<Self>> {
///         vec![
///             FieldAccessor::new(
///                 "id",
///                 |d: &Device| Value::Uuid(d.id),
///                 |d: &mut Device, v| {
///                     if let Value::Uuid(u) = v {
///                         d.id = u;
///                     }
///                 },
///             ),
///             FieldAccessor::new(
///                 "name",
///                 |d: &Device| Value::from(d.name.as_str()),
///                 |d: &mut Device, v| {
///                     if let Value::Text(s) = v {
///                         d.name = s;
///                     }
///                 },
///             ),
///         ]
///     }
/// }
/// ```
pub trait Entity: Send + Sync + Sized + 'static {
    /// The bare type name, used for default table naming and diagnostics.
    fn entity_name() -> &'static str;

    /// The loadable fields, in serialization order.
    fn fields() -> Vec<FieldAccessor<Self>>;
}

/// Accessors for one entity field.
///
/// Plain function pointers keep the descriptor `Copy`-cheap and force accessors
/// to be non-capturing, which is what lets a compiled plan serve every entity
/// instance for the process lifetime.
pub struct FieldAccessor<T> {
    pub name: &'static str,
    pub get: fn(&T) -> Value,
    /// `None` marks a read-only field. Read-only fields are never eligible for
    /// serialization (there is no way to write a generated default back).
    pub set: Option<fn(&mut T, Value)>,
}

impl<T> FieldAccessor<T> {
    pub fn new(name: &'static str, get: fn(&T) -> Value, set: fn(&mut T, Value)) -> Self {
        Self {
            name,
            get,
            set: Some(set),
        }
    }

    /// A field that can be read but never written back. Excluded from loading.
    pub fn read_only(name: &'static str, get: fn(&T) -> Value) -> Self {
        Self {
            name,
            get,
            set: None,
        }
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }
}
