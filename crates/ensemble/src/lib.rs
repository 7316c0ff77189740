//! Multi-model ensemble assembly and reduction.
//!
//! Catalog records are grouped into members (one model/run pair each),
//! every member is normalized onto the canonical grid for the requested
//! period, and the resulting stack is reduced cell by cell (mean, median
//! or an arbitrary quantile) into a single ensemble field.

pub mod member;
pub mod reduce;
pub mod stack;

pub use member::{group_members, Member, MemberKey};
pub use reduce::{quantile, reduce_stack, ReduceOp};
pub use stack::{EnsembleBuilder, EnsembleMember, EnsembleStack};
