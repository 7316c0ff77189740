//! Projected fields: the ensemble statistic over a future year window.

use climate_common::{CanonicalField, ClimateResult, TimeReduction};
use ensemble::{reduce_stack, EnsembleBuilder, EnsembleStack, ReduceOp};
use storage::FileRecord;

/// Build the projected field for a window: normalize every member over
/// the window and reduce the stack with the given statistic. The stack
/// is returned alongside the field so callers can report member
/// diagnostics.
pub async fn project_window(
    builder: &EnsembleBuilder,
    records: &[FileRecord],
    start: i32,
    end: i32,
    op: ReduceOp,
) -> ClimateResult<(CanonicalField, EnsembleStack)> {
    let stack = builder
        .build_stack(records, TimeReduction::Window { start, end })
        .await?;
    Ok((reduce_stack(&stack, op), stack))
}
