//! Lenses
//!
//! Composable, stateless accessors used to derive stores focused on a part
//! of their parent's value. See [`Lens`] for the laws every lens is expected
//! to follow; the `lens_of_*` constructors cover lists, maps, enums and
//! optional values.

mod base;
mod collection;

pub use self::base::Lens;
pub use self::collection::{
    lens_of_element, lens_of_index, lens_of_key, lens_of_variant, lens_with_default,
    KeyedCollection,
};

pub(crate) use self::base::join_ids;
