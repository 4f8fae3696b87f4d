//! Location source backed by a JSON snapshot file written by a tracker feed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::collaborator_traits::{CollaboratorResult, LocationSource};
use crate::error::CollaboratorError;
use crate::schema::{LocationSample, Subject, SubjectId};

/// On-disk snapshot shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationSnapshot {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub samples: Vec<LocationSample>,
}

/// Re-reads the snapshot file on every call so an external feed can keep
/// rewriting it.
///
/// A missing file is transient (the feed has not written yet); a file that
/// does not parse is a permanent, malformed-data failure.
pub struct JsonFileLocationSource {
    path: PathBuf,
}

impl JsonFileLocationSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn load(&self) -> CollaboratorResult<LocationSnapshot> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CollaboratorError::transient(
                    "location",
                    format!("feed file {} not present yet", self.path.display()),
                ))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl LocationSource for JsonFileLocationSource {
    async fn subjects(&self) -> CollaboratorResult<Vec<Subject>> {
        let snapshot = self.load().await?;
        let mut subjects = snapshot.subjects;
        // Subjects that only appear through samples are still tracked.
        for sample in &snapshot.samples {
            if !subjects.iter().any(|s| s.subject_id == sample.subject_id) {
                subjects.push(Subject {
                    subject_id: sample.subject_id.clone(),
                    display_name: sample.subject_id.0.clone(),
                });
            }
        }
        Ok(subjects)
    }

    async fn latest_sample(
        &self,
        subject_id: &SubjectId,
    ) -> CollaboratorResult<Option<LocationSample>> {
        let snapshot = self.load().await?;
        Ok(snapshot
            .samples
            .into_iter()
            .filter(|s| &s.subject_id == subject_id)
            .max_by_key(|s| s.timestamp_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonFileLocationSource::new(dir.path().join("feed.json"));
        let err = source.subjects().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn garbage_file_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(&path, b"[[[").unwrap();
        let source = JsonFileLocationSource::new(&path);
        let err = source.latest_sample(&SubjectId::from("p1")).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn picks_newest_sample_and_infers_subjects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.json");
        std::fs::write(
            &path,
            br#"{
                "subjects": [{"subject_id": "p1", "display_name": "Buddy"}],
                "samples": [
                    {"subject_id": "p1", "latitude": 4.6, "longitude": -74.08, "timestamp_millis": 10},
                    {"subject_id": "p1", "latitude": 4.7, "longitude": -74.08, "timestamp_millis": 30},
                    {"subject_id": "p2", "latitude": 4.6, "longitude": -74.08, "timestamp_millis": 20}
                ]
            }"#,
        )
        .unwrap();
        let source = JsonFileLocationSource::new(&path);

        let subjects = source.subjects().await.unwrap();
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].display_name, "Buddy");

        let latest = source
            .latest_sample(&SubjectId::from("p1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.timestamp_millis, 30);

        assert!(source
            .latest_sample(&SubjectId::from("p9"))
            .await
            .unwrap()
            .is_none());
    }
}
