use super::error::ValidationError;

/// One entry of an idlist element.
///
/// A `Range` with `step: None` is written without a step attribute, which
/// is how consecutive ranges with breaks between them are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdEntry {
    Range {
        start: i64,
        end: i64,
        step: Option<i64>,
    },
    Value(i64),
}

impl IdEntry {
    pub fn range(start: i64, end: i64) -> Self {
        Self::Range {
            start,
            end,
            step: None,
        }
    }

    pub fn stepped(start: i64, end: i64, step: i64) -> Self {
        Self::Range {
            start,
            end,
            step: Some(step),
        }
    }

    /// Number of ids covered, or why the entry is malformed
    pub fn count(&self) -> Result<u64, String> {
        match *self {
            Self::Value(_) => Ok(1),
            Self::Range { start, end, step } => {
                let step = step.unwrap_or(1);
                if step <= 0 {
                    Err(format!("step {step} must be positive"))
                } else if end < start {
                    Err(format!("end {end} is before start {start}"))
                } else {
                    Ok(((end - start) / step + 1) as u64)
                }
            }
        }
    }
}

/// Ordered list of pixel ids, in the order the physical elements were placed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdList {
    entries: Vec<IdEntry>,
}

impl IdList {
    pub fn new(entries: Vec<IdEntry>) -> Self {
        Self { entries }
    }

    /// A single dense range `first..=last`
    pub fn dense(first: i64, last: i64) -> Self {
        Self::new(vec![IdEntry::range(first, last)])
    }

    pub fn values(values: &[i64]) -> Self {
        Self::new(values.iter().map(|v| IdEntry::Value(*v)).collect())
    }

    pub fn entries(&self) -> &[IdEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: IdEntry) {
        self.entries.push(entry)
    }

    /// Append all entries of other after ours
    pub fn extend(&mut self, other: IdList) {
        self.entries.extend(other.entries)
    }

    /// Total number of ids, failing on the first malformed entry
    pub fn count(&self) -> Result<u64, String> {
        self.entries
            .iter()
            .try_fold(0u64, |sum, entry| Ok(sum + entry.count()?))
    }

    /// Enumerate every id in order
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().flat_map(|entry| {
            let (start, end, step) = match *entry {
                IdEntry::Value(v) => (v, v, 1),
                IdEntry::Range { start, end, step } => (start, end, step.unwrap_or(1).max(1)),
            };
            (start..=end).step_by(step as usize)
        })
    }

    /// Flat triple form `[start, end, step]`; values become `[v, v, None]`
    pub fn as_triples(&self) -> Vec<(i64, i64, Option<i64>)> {
        self.entries
            .iter()
            .map(|entry| match *entry {
                IdEntry::Value(v) => (v, v, None),
                IdEntry::Range { start, end, step } => (start, end, step),
            })
            .collect()
    }
}

/// Ids of a panel made of `units` identical units of `pixels_per_unit` pixels.
///
/// Each unit gets one contiguous range; `gap` ids are skipped between units.
pub fn panel_idlist(units: usize, pixels_per_unit: i64, start: i64, gap: i64) -> IdList {
    let mut list = IdList::default();
    let mut s = start;
    for _ in 0..units {
        list.push(IdEntry::range(s, s + pixels_per_unit - 1));
        s += pixels_per_unit + gap;
    }
    list
}

/// Ids of a double panel whose units interleave front and back.
///
/// Front units take the even blocks and back units the odd ones; the front
/// panel is enumerated completely before the back panel.
pub fn double_panel_idlist(units: usize, pixels_per_unit: i64, start: i64) -> IdList {
    let mut list = panel_idlist(units, pixels_per_unit, start, pixels_per_unit);
    list.extend(panel_idlist(
        units,
        pixels_per_unit,
        start + pixels_per_unit,
        pixels_per_unit,
    ));
    list
}

/// Ids of a bank where every unit owns a reserved block of `reserved_per_unit` ids.
///
/// Only the first `pixels_per_unit` ids of each block are used, so units can be
/// replaced by larger ones later without renumbering the rest of the bank.
pub fn bank_idlist(
    units: usize,
    pixels_per_unit: i64,
    reserved_per_unit: i64,
    offset: i64,
) -> IdList {
    debug_assert!(reserved_per_unit >= pixels_per_unit);
    panel_idlist(units, pixels_per_unit, offset, reserved_per_unit - pixels_per_unit)
}

/// Compress an ordered id sequence into maximal runs of consecutive ids
pub fn multiple_ranges(ids: &[i64]) -> IdList {
    let mut list = IdList::default();
    let mut iter = ids.iter().copied();
    let Some(first) = iter.next() else {
        return list;
    };
    let (mut start, mut end) = (first, first);
    for id in iter {
        if id == end + 1 {
            end = id;
        } else {
            list.push(IdEntry::range(start, end));
            start = id;
            end = id;
        }
    }
    list.push(IdEntry::range(start, end));
    list
}

/// Check every entry of a named list
pub fn validate_idlist(name: &str, list: &IdList) -> Result<u64, ValidationError> {
    list.count().map_err(|reason| ValidationError::BadIdEntry {
        idlist: name.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_eightpack_panel() {
        let list = panel_idlist(2, 4 * 256, 0, 0);
        assert_eq!(
            list.as_triples(),
            vec![(0, 1023, None), (1024, 2047, None)]
        );
    }

    #[test]
    fn test_dense_panel_is_consecutive() {
        let list = panel_idlist(24, 1024, 100, 0);
        let ids: Vec<i64> = list.ids().collect();
        assert_eq!(ids.len(), 24 * 1024);
        assert_eq!(list.count().unwrap(), 24 * 1024);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(*id, 100 + i as i64);
        }
    }

    #[test]
    fn test_double_panel_interleaves() {
        let list = double_panel_idlist(2, 1024, 0);
        assert_eq!(
            list.as_triples(),
            vec![
                (0, 1023, None),
                (2048, 3071, None),
                (1024, 2047, None),
                (3072, 4095, None)
            ]
        );
        let mut ids: Vec<i64> = list.ids().collect();
        ids.sort();
        assert_eq!(ids, (0..4096).collect::<Vec<i64>>());
    }

    #[test]
    fn test_bank_reserves_blocks() {
        let list = bank_idlist(3, 4096, 5000, 100_000);
        assert_eq!(
            list.as_triples(),
            vec![
                (100_000, 104_095, None),
                (105_000, 109_095, None),
                (110_000, 114_095, None)
            ]
        );
        assert_eq!(list.count().unwrap(), 3 * 4096);
    }

    #[test]
    fn test_multiple_ranges() {
        let list = multiple_ranges(&[5, 6, 7, 10, 11, 3]);
        assert_eq!(
            list.as_triples(),
            vec![(5, 7, None), (10, 11, None), (3, 3, None)]
        );
        assert!(multiple_ranges(&[]).entries().is_empty());
    }

    #[test]
    fn test_stepped_and_values_count() {
        let mut list = IdList::new(vec![IdEntry::stepped(0, 9, 3)]);
        list.extend(IdList::values(&[-2, -3]));
        assert_eq!(list.count().unwrap(), 6);
        assert_eq!(list.ids().collect::<Vec<i64>>(), vec![0, 3, 6, 9, -2, -3]);
    }

    #[test]
    fn test_malformed_entries() {
        assert!(IdEntry::range(10, 9).count().is_err());
        assert!(IdEntry::stepped(0, 9, 0).count().is_err());
        let bad = IdList::new(vec![IdEntry::range(0, 3), IdEntry::range(8, 2)]);
        assert!(validate_idlist("bad", &bad).is_err());
    }
}
