use std::hash::{BuildHasher, Hash};

/// Generates typed `.get_x()` / `.unwrap_x()` accessors on an enum variant,
/// the way `Val`, `EntityType`, and the index enums in this crate all expose
/// their payloads without a manual `match` at every call site.
#[macro_export]
macro_rules! enum_accessors {
    ($bind:ident $(($variant:ident($ty:ty) $is:ident $get:ident $unwrap:ident $cvt:expr))*) => ($(
        #[inline]
        pub fn $is(&self) -> bool {
            matches!(self, Self::$variant(..))
        }

        /// Attempt to access the underlying value of this variant, returning
        /// `None` if it is not the correct type.
        #[inline]
        pub fn $get(&self) -> Option<$ty> {
            if let Self::$variant($bind) = self {
                Some($cvt)
            } else {
                None
            }
        }

        /// Returns the underlying value of this variant, panicking if it's
        /// the wrong variant.
        #[inline]
        pub fn $unwrap(&self) -> $ty {
            self.$get().expect(concat!("expected ", stringify!($variant)))
        }
    )*)
}

pub(crate) trait HashMapEntryTryExt<'a, K, V, S>: Sized {
    fn or_try_insert_with<E, F: FnOnce() -> Result<V, E>>(self, default: F) -> Result<&'a mut V, E>
    where
        K: Hash,
        S: BuildHasher;
}

impl<'a, K, V, S> HashMapEntryTryExt<'a, K, V, S> for hashbrown::hash_map::Entry<'a, K, V, S> {
    fn or_try_insert_with<E, F: FnOnce() -> Result<V, E>>(self, default: F) -> Result<&'a mut V, E>
    where
        K: Hash,
        S: BuildHasher,
    {
        match self {
            hashbrown::hash_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            hashbrown::hash_map::Entry::Vacant(entry) => Ok(entry.insert(default()?)),
        }
    }
}
