use uuid::Uuid;

use super::{CandidateSet, PurgeError};
use crate::models::CandidateId;

/// A contiguous slice of the candidate set, deleted in one transaction.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    index: usize,
    candidates: &'a [CandidateId],
}

impl<'a> Batch<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn candidates(&self) -> &'a [CandidateId] {
        self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// First candidate in scan order. Batches from [`partition`] are never empty.
    pub fn first(&self) -> Option<CandidateId> {
        self.candidates.first().copied()
    }

    pub fn uids(&self) -> Vec<i64> {
        self.candidates.iter().map(|c| c.uid).collect()
    }

    pub fn guids(&self) -> Vec<Uuid> {
        self.candidates.iter().map(|c| c.guid).collect()
    }
}

/// Split `candidates` into batches of `batch_size`, preserving scan order.
/// Only the last batch may be shorter.
///
/// A non-positive `batch_size` is a configuration error.
pub fn partition(candidates: &CandidateSet, batch_size: i64) -> Result<Vec<Batch<'_>>, PurgeError> {
    let size = validate_batch_size(batch_size)?;

    Ok(candidates
        .as_slice()
        .chunks(size)
        .enumerate()
        .map(|(index, candidates)| Batch { index, candidates })
        .collect())
}

pub(crate) fn validate_batch_size(batch_size: i64) -> Result<usize, PurgeError> {
    if batch_size <= 0 {
        return Err(PurgeError::Configuration(format!(
            "batch size must be positive, got {}",
            batch_size
        )));
    }
    usize::try_from(batch_size).map_err(|_| {
        PurgeError::Configuration(format!("batch size {} does not fit in memory", batch_size))
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::rstest;

    use super::*;

    fn candidates(n: usize) -> CandidateSet {
        let ids = (1..=n as i64)
            .map(|uid| CandidateId {
                uid,
                guid: Uuid::new_v4(),
            })
            .collect();
        CandidateSet::new(Utc::now(), ids)
    }

    #[rstest]
    #[case::exact_multiple(10, 5, 2, 5)]
    #[case::remainder(11, 5, 3, 1)]
    #[case::single_batch(3, 1000, 1, 3)]
    #[case::one_per_batch(4, 1, 4, 1)]
    #[case::single_candidate(1, 1, 1, 1)]
    fn test_partition_arithmetic(
        #[case] m: usize,
        #[case] n: i64,
        #[case] expected_batches: usize,
        #[case] expected_last: usize,
    ) {
        let set = candidates(m);
        let batches = partition(&set, n).unwrap();
        assert_eq!(batches.len(), m.div_ceil(n as usize));
        assert_eq!(batches.len(), expected_batches);
        assert_eq!(batches.last().unwrap().len(), expected_last);
    }

    #[test]
    fn test_partition_preserves_order_without_gaps() {
        let set = candidates(7);
        let batches = partition(&set, 3).unwrap();

        let flattened: Vec<i64> = batches.iter().flat_map(|b| b.uids()).collect();
        assert_eq!(flattened, (1..=7).collect::<Vec<_>>());

        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.index(), i);
            assert_eq!(batch.first().unwrap().uid, (i * 3 + 1) as i64);
        }
    }

    #[test]
    fn test_partition_empty_set() {
        let set = candidates(0);
        assert!(partition(&set, 10).unwrap().is_empty());
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(i64::MIN)]
    fn test_non_positive_batch_size_is_configuration_error(#[case] size: i64) {
        let set = candidates(3);
        assert!(matches!(
            partition(&set, size),
            Err(PurgeError::Configuration(_))
        ));
    }
}
