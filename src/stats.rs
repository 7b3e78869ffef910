//! Per-ball draw frequencies derived from history.
//!
//! An explicit memo rather than a global: the reconciler and the merge
//! path call `invalidate` after every successful history write, and the
//! next reader recomputes lazily.

use std::sync::RwLock;

use crate::types::{BALL_MAX, DrawRecord};

pub struct FrequencyCache {
    // index 0 holds the count for ball 1
    counts: RwLock<Option<Vec<u32>>>,
}

impl FrequencyCache {
    pub fn new() -> Self {
        Self {
            counts: RwLock::new(None),
        }
    }

    pub fn get_or_compute(&self, records: &[DrawRecord]) -> Vec<u32> {
        if let Some(counts) = self
            .counts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
        {
            return counts.clone();
        }
        let computed = compute(records);
        *self
            .counts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(computed.clone());
        computed
    }

    pub fn invalidate(&self) {
        *self
            .counts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

fn compute(records: &[DrawRecord]) -> Vec<u32> {
    let mut counts = vec![0u32; BALL_MAX as usize];
    for record in records {
        for &n in &record.numbers {
            if (1..=BALL_MAX).contains(&n) {
                counts[n as usize - 1] += 1;
            }
        }
    }
    counts
}
