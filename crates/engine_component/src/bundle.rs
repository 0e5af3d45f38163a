//! Component bundles: tuples of components spawned together.

use crate::archetype::{ArchetypeTable, Column};
use crate::component::Component;
use crate::tick::Tick;

/// A set of components written into one new archetype row.
///
/// Implemented for tuples of 1 to 8 distinct component types.
pub trait Bundle {
    /// One empty column per component of the bundle.
    fn empty_columns() -> Vec<Column>;

    /// Pushes every component into its column of `table`, stamping `tick`.
    ///
    /// The caller has already pushed the row's entity.
    fn write_into(self, table: &mut ArchetypeTable, tick: Tick);
}

macro_rules! impl_bundle {
    ($($ty:ident => $value:ident),+) => {
        impl<$($ty: Component),+> Bundle for ($($ty,)+) {
            fn empty_columns() -> Vec<Column> {
                vec![$(Column::new::<$ty>()),+]
            }

            fn write_into(self, table: &mut ArchetypeTable, tick: Tick) {
                let ($($value,)+) = self;
                $(
                    if let Some(column) = table.column_mut(<$ty as Component>::component_type_id()) {
                        column.push($value, tick);
                    }
                )+
            }
        }
    };
}

impl_bundle!(A => a);
impl_bundle!(A => a, B => b);
impl_bundle!(A => a, B => b, C => c);
impl_bundle!(A => a, B => b, C => c, D => d);
impl_bundle!(A => a, B => b, C => c, D => d, E => e);
impl_bundle!(A => a, B => b, C => c, D => d, E => e, F => f);
impl_bundle!(A => a, B => b, C => c, D => d, E => e, F => f, G => g);
impl_bundle!(A => a, B => b, C => c, D => d, E => e, F => f, G => g, H => h);
