use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::attempt::{AnswerRecord, percentage};
use crate::model::quiz::QuizType;

/// Correct/attempted counts for one subject area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaTally {
    pub area: String,
    pub correct: u32,
    pub attempted: u32,
}

impl AreaTally {
    /// Fold answer rows into per-area tallies.
    ///
    /// Rows from quiz types that do not count toward mastery, and rows whose
    /// question has no area, are skipped.
    pub fn accumulate<'a, I>(rows: I) -> Vec<AreaTally>
    where
        I: IntoIterator<Item = (QuizType, &'a AnswerRecord)>,
    {
        let mut by_area: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
        for (quiz_type, row) in rows {
            if !quiz_type.counts_toward_mastery() {
                continue;
            }
            let Some(area) = row.area.as_deref() else {
                continue;
            };
            let entry = by_area.entry(area).or_default();
            entry.1 = entry.1.saturating_add(1);
            if row.is_correct {
                entry.0 = entry.0.saturating_add(1);
            }
        }

        by_area
            .into_iter()
            .map(|(area, (correct, attempted))| AreaTally {
                area: area.to_owned(),
                correct,
                attempted,
            })
            .collect()
    }
}

/// Rolling correctness percentage per subject area.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MasteryMap(BTreeMap<String, u8>);

impl MasteryMap {
    #[must_use]
    pub fn from_tallies(tallies: &[AreaTally]) -> Self {
        let mut map = BTreeMap::new();
        for tally in tallies {
            if tally.attempted == 0 {
                continue;
            }
            map.insert(tally.area.clone(), percentage(tally.correct, tally.attempted));
        }
        Self(map)
    }

    #[must_use]
    pub fn get(&self, area: &str) -> Option<u8> {
        self.0.get(area).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
