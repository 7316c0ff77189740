//! Grouping of catalog records into ensemble members.
//!
//! A member is one (model, run) pair; a model contributing several runs
//! contributes several members. Records of one member are its time
//! segments, kept sorted by start stamp so segment concatenation walks
//! forward in time.

use std::collections::BTreeMap;

use storage::FileRecord;

/// Identity of one ensemble member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberKey {
    pub model: String,
    pub run: String,
}

impl std::fmt::Display for MemberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.model, self.run)
    }
}

/// One member and its time segments.
#[derive(Debug, Clone)]
pub struct Member {
    pub key: MemberKey,
    /// Segments sorted ascending by start stamp.
    pub segments: Vec<FileRecord>,
}

/// Group records into members, ordered by key for deterministic output.
pub fn group_members(records: &[FileRecord]) -> Vec<Member> {
    let mut by_key: BTreeMap<MemberKey, Vec<FileRecord>> = BTreeMap::new();
    for rec in records {
        let key = MemberKey {
            model: rec.model.clone(),
            run: rec.run.clone(),
        };
        by_key.entry(key).or_default().push(rec.clone());
    }

    by_key
        .into_iter()
        .map(|(key, mut segments)| {
            segments.sort_by_key(|r| r.start);
            Member { key, segments }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(key: &str) -> FileRecord {
        FileRecord::parse_key(key).unwrap()
    }

    #[test]
    fn test_group_by_model_and_run() {
        let records = vec![
            rec("mmrpm2p5_AERmon_ModelA_ssp245_r1i1p1f1_gn_205001-210012.nc"),
            rec("mmrpm2p5_AERmon_ModelA_ssp245_r1i1p1f1_gn_201501-204912.nc"),
            rec("mmrpm2p5_AERmon_ModelA_ssp245_r2i1p1f1_gn_201501-210012.nc"),
            rec("mmrpm2p5_AERmon_ModelB_ssp245_r1i1p1f1_gn_201501-210012.nc"),
        ];
        let members = group_members(&records);
        assert_eq!(members.len(), 3);

        // Two runs of ModelA are distinct members.
        assert_eq!(members[0].key.model, "ModelA");
        assert_eq!(members[0].key.run, "r1i1p1f1");
        assert_eq!(members[1].key.run, "r2i1p1f1");
        assert_eq!(members[2].key.model, "ModelB");

        // Segments sorted by start.
        let starts: Vec<i32> = members[0].segments.iter().map(|s| s.start.year).collect();
        assert_eq!(starts, vec![2015, 2050]);
    }
}
