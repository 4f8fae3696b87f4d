//! Display names of known subjects, refreshed by every sweep.
//!
//! Passive and realtime paths only carry a subject id; alert text uses the
//! name remembered here and falls back to the id.

use dashmap::DashMap;
use safezone_state::{Subject, SubjectId};

#[derive(Debug, Default)]
pub struct SubjectDirectory {
    subjects: DashMap<SubjectId, Subject>,
}

impl SubjectDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, subject: &Subject) {
        self.subjects
            .insert(subject.subject_id.clone(), subject.clone());
    }

    pub fn resolve(&self, subject_id: &SubjectId) -> Subject {
        self.subjects
            .get(subject_id)
            .map(|s| s.clone())
            .unwrap_or_else(|| Subject {
                subject_id: subject_id.clone(),
                display_name: subject_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}
