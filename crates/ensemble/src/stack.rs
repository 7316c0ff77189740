//! Building an ensemble stack: normalize every member for the requested
//! period and collect the resulting canonical fields.
//!
//! A member failing to load or normalize is logged and dropped; the
//! request only fails when no member survives.

use std::sync::Arc;

use tracing::{info, warn};

use climate_common::{
    CanonicalField, ClimateError, ClimateResult, TimeReduction, N_LAT, N_LON,
};
use regrid::{normalize, normalize_counted, DatasetSource};
use storage::FileRecord;

use crate::member::{group_members, Member, MemberKey};

/// One normalized member field.
#[derive(Debug, Clone)]
pub struct EnsembleMember {
    pub key: MemberKey,
    pub field: CanonicalField,
}

/// All surviving member fields for one period, plus the errors of the
/// members that were dropped.
#[derive(Debug, Clone)]
pub struct EnsembleStack {
    pub members: Vec<EnsembleMember>,
    pub reduction: TimeReduction,
    /// One "key: reason" entry per dropped member.
    pub errors: Vec<String>,
}

impl EnsembleStack {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Distinct models among the surviving members.
    pub fn n_models(&self) -> usize {
        let mut models: Vec<&str> = self.members.iter().map(|m| m.key.model.as_str()).collect();
        models.sort_unstable();
        models.dedup();
        models.len()
    }

    /// Member keys in stack order.
    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.key.to_string()).collect()
    }
}

/// Assembles ensemble stacks from catalog records.
pub struct EnsembleBuilder {
    source: Arc<dyn DatasetSource>,
}

impl EnsembleBuilder {
    pub fn new(source: Arc<dyn DatasetSource>) -> Self {
        Self { source }
    }

    /// Normalize every member onto the canonical grid for `reduction`.
    ///
    /// Fails with `NoUsableData` when no member yields a usable field;
    /// the first member errors are carried for diagnosis.
    pub async fn build_stack(
        &self,
        records: &[FileRecord],
        reduction: TimeReduction,
    ) -> ClimateResult<EnsembleStack> {
        let members = group_members(records);
        let mut out = Vec::with_capacity(members.len());
        let mut errors = Vec::new();

        for member in &members {
            match self.build_member(member, reduction).await {
                Ok(field) if field.has_finite() => {
                    out.push(EnsembleMember {
                        key: member.key.clone(),
                        field,
                    });
                }
                Ok(_) => {
                    warn!(member = %member.key, "Member field is all-NaN, dropping");
                    errors.push(format!("{}: field is all-NaN", member.key));
                }
                Err(e) => {
                    warn!(member = %member.key, error = %e, "Member failed, dropping");
                    errors.push(format!("{}: {}", member.key, e));
                }
            }
        }

        if out.is_empty() {
            return Err(ClimateError::no_usable_data(
                format!("no usable member for {}", reduction),
                &errors,
            ));
        }

        info!(
            members = out.len(),
            failed = errors.len(),
            period = %reduction,
            "Ensemble stack built"
        );
        Ok(EnsembleStack {
            members: out,
            reduction,
            errors,
        })
    }

    /// One member: normalize each segment that overlaps the period, then
    /// merge the segment fields cell by cell, weighted by the count of
    /// finite samples each segment contributed to that cell. The merge
    /// equals a mean over the concatenated samples even when a segment
    /// has gaps.
    async fn build_member(
        &self,
        member: &Member,
        reduction: TimeReduction,
    ) -> ClimateResult<CanonicalField> {
        let (y0, y1) = match reduction {
            TimeReduction::Year(y) => (y, y),
            TimeReduction::Window { start, end } => (start, end),
        };
        let segments: Vec<&FileRecord> = member
            .segments
            .iter()
            .filter(|s| s.covers_window(y0, y1))
            .collect();
        if segments.is_empty() {
            return Err(ClimateError::EmptyWindow(format!(
                "no segment of {} overlaps {}",
                member.key, reduction
            )));
        }

        if let [segment] = segments[..] {
            let ds = self.source.load(segment).await?;
            return normalize(&ds, &reduction);
        }

        let mut sums = vec![0.0f64; N_LAT * N_LON];
        let mut totals = vec![0.0f64; N_LAT * N_LON];
        for segment in segments {
            let ds = self.source.load(segment).await?;
            let (field, counts) = normalize_counted(&ds, &reduction)?;
            for cell in 0..N_LAT * N_LON {
                let v = field.data[cell];
                let n = counts[cell];
                if v.is_finite() && n > 0.0 {
                    sums[cell] += v * n;
                    totals[cell] += n;
                }
            }
        }

        let mut merged = CanonicalField::empty(reduction);
        for cell in 0..N_LAT * N_LON {
            if totals[cell] > 0.0 {
                merged.data[cell] = sums[cell] / totals[cell];
            }
        }
        Ok(merged)
    }
}
