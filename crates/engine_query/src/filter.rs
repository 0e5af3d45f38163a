//! The filter combinator: `Filter<(F0, F1, ...)>` accepts a row only when
//! every sub-filter accepts it.
//!
//! Every sub-filter is stepped on every row, even after an earlier one has
//! rejected it. Row-stepping filters own their own cursor copy and would fall
//! out of step with the data term otherwise.

use std::marker::PhantomData;

use engine_component::{QueryDescriptor, TickWindow};

use crate::builder::QueryBuilder;
use crate::cursor::{RowPosition, TableCursor};
use crate::term::{FilterIter, QueryFilter, Term};

/// Conjunction of the filters `T = (F0, F1, ...)`. Sub-filters may themselves
/// be `Filter`s.
pub struct Filter<T>(PhantomData<fn() -> T>);

macro_rules! impl_filter {
    ($($ty:ident $iter:ident),+) => {
        impl<$($ty: QueryFilter),+> Term for Filter<($($ty,)+)> {
            fn build(builder: &mut QueryBuilder) {
                $(<$ty as Term>::build(builder);)+
            }

            fn access(descriptor: &mut QueryDescriptor) {
                $(<$ty as Term>::access(descriptor);)+
            }
        }

        // SAFETY: only forwards to sub-filters, which uphold the contract.
        unsafe impl<$($ty: QueryFilter),+> QueryFilter for Filter<($($ty,)+)> {
            type Iter<'q> = ($(<$ty as QueryFilter>::Iter<'q>,)+);

            fn create_iter(cursor: TableCursor<'_>) -> Self::Iter<'_> {
                ($(<$ty as QueryFilter>::create_iter(cursor),)+)
            }
        }

        impl<$($iter: FilterIter),+> FilterIter for ($($iter,)+) {
            #[allow(non_snake_case)]
            fn move_next(&mut self) -> bool {
                let ($($iter,)+) = self;
                let mut accepted = true;
                $(accepted &= $iter.move_next();)+
                accepted
            }

            #[allow(non_snake_case)]
            fn set_ticks(&mut self, window: TickWindow) {
                let ($($iter,)+) = self;
                $($iter.set_ticks(window);)+
            }

            #[allow(non_snake_case)]
            fn position(&self) -> Option<RowPosition> {
                let ($($iter,)+) = self;
                let mut position = None;
                $(
                    let step = $iter.position();
                    debug_assert!(
                        position.is_none() || step.is_none() || position == step,
                        "filter terms fell out of step"
                    );
                    position = position.or(step);
                )+
                position
            }
        }
    };
}

impl_filter!(A IA);
impl_filter!(A IA, B IB);
impl_filter!(A IA, B IB, C IC);
impl_filter!(A IA, B IB, C IC, D ID);
impl_filter!(A IA, B IB, C IC, D ID, E IE);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG, H IH);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG, H IH, I II);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG, H IH, I II, J IJ);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG, H IH, I II, J IJ, K IK);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG, H IH, I II, J IJ, K IK, L IL);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG, H IH, I II, J IJ, K IK, L IL, M IM);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG, H IH, I II, J IJ, K IK, L IL, M IM, N IN);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG, H IH, I II, J IJ, K IK, L IL, M IM, N IN, O IO);
impl_filter!(A IA, B IB, C IC, D ID, E IE, F IF, G IG, H IH, I II, J IJ, K IK, L IL, M IM, N IN, O IO, P IP);

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Counting<'a> {
        calls: &'a Cell<usize>,
        answer: bool,
    }

    impl FilterIter for Counting<'_> {
        fn move_next(&mut self) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.answer
        }

        fn set_ticks(&mut self, _window: TickWindow) {}
    }

    #[test]
    fn test_and_does_not_short_circuit() {
        let first = Cell::new(0);
        let second = Cell::new(0);
        let mut both = (
            Counting {
                calls: &first,
                answer: false,
            },
            Counting {
                calls: &second,
                answer: true,
            },
        );

        assert!(!both.move_next());
        assert!(!both.move_next());
        assert_eq!(first.get(), 2);
        assert_eq!(second.get(), 2);
    }

    #[test]
    fn test_all_accept() {
        let calls = Cell::new(0);
        let mut all = (
            Counting {
                calls: &calls,
                answer: true,
            },
            Counting {
                calls: &calls,
                answer: true,
            },
            Counting {
                calls: &calls,
                answer: true,
            },
        );
        assert!(all.move_next());
        assert_eq!(calls.get(), 3);
    }
}
