//! In-memory task registry.
//!
//! The map lock is held only to look up or insert a slot. Each task has its own
//! lock, so mutations on one task never wait on another. Mutators run against a
//! copy which replaces the stored record only when the mutator succeeds; readers
//! therefore always see a whole record from before or after a transition.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::record::{TaskId, TaskRecord, UploadInfo};
use crate::error::PipelineError;

type Slot = Arc<RwLock<TaskRecord>>;

#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Slot>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new `pending` task and return its id.
    pub fn create(&self, info: UploadInfo) -> TaskId {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        loop {
            let id = Uuid::new_v4();
            if let Entry::Vacant(entry) = tasks.entry(id) {
                entry.insert(Arc::new(RwLock::new(TaskRecord::new(id, info))));
                debug!("Registered task {}", id);
                return id;
            }
        }
    }

    pub fn get(&self, id: TaskId) -> Result<TaskRecord, PipelineError> {
        let slot = self.slot(id)?;
        // Records are replaced wholesale, so a poisoned lock still guards a complete record.
        let record = slot.read().unwrap_or_else(PoisonError::into_inner);
        Ok(record.clone())
    }

    /// Apply `mutator` atomically and return the committed record.
    ///
    /// On error the stored record is left exactly as it was.
    pub fn update<F>(&self, id: TaskId, mutator: F) -> Result<TaskRecord, PipelineError>
    where
        F: FnOnce(&mut TaskRecord) -> Result<(), PipelineError>,
    {
        let slot = self.slot(id)?;
        let mut stored = slot.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = stored.clone();
        mutator(&mut next)?;
        *stored = next.clone();
        Ok(next)
    }

    /// Snapshots of every task, newest first.
    pub fn list(&self) -> Vec<TaskRecord> {
        let slots: Vec<Slot> = {
            let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
            tasks.values().cloned().collect()
        };

        let mut records: Vec<TaskRecord> = slots
            .iter()
            .map(|slot| slot.read().unwrap_or_else(PoisonError::into_inner).clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn len(&self) -> usize {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: TaskId) -> Result<Slot, PipelineError> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(PipelineError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MeetingSummary, Transcript};
    use crate::pipeline::PipelineMode;
    use crate::task::TaskStatus;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn info(name: &str) -> UploadInfo {
        UploadInfo {
            original_filename: name.to_string(),
            content_type: "audio/mpeg".to_string(),
            size_bytes: 42,
        }
    }

    #[test]
    fn test_create_and_get() {
        let registry = TaskRegistry::new();
        assert!(registry.is_empty());

        let id = registry.create(info("a.mp3"));
        let record = registry.get(id).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.original_filename, "a.mp3");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = TaskRegistry::new();
        let a = registry.create(info("a.mp3"));
        let b = registry.create(info("a.mp3"));
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let registry = TaskRegistry::new();
        let id = Uuid::new_v4();
        assert!(matches!(registry.get(id), Err(PipelineError::NotFound(x)) if x == id));
        assert!(matches!(
            registry.update(id, |r| r.begin_upload()),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_mutator_leaves_record_untouched() {
        let registry = TaskRegistry::new();
        let id = registry.create(info("a.mp3"));
        let before = registry.get(id).unwrap();

        let result = registry.update(id, |record| {
            record.message = "half written".to_string();
            record.begin_summarize()
        });

        assert!(result.unwrap_err().is_invalid_state());
        let after = registry.get(id).unwrap();
        assert_eq!(after.message, before.message);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn test_list_is_newest_first() {
        let registry = TaskRegistry::new();
        let first = registry.create(info("first.mp3"));
        thread::sleep(std::time::Duration::from_millis(5));
        let second = registry.create(info("second.mp3"));

        let ids: Vec<TaskId> = registry.list().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn test_same_task_updates_serialize() {
        let registry = Arc::new(TaskRegistry::new());
        let id = registry.create(info("a.mp3"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || registry.update(id, |r| r.begin_upload()).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.get(id).unwrap().status, TaskStatus::Uploading);
    }

    #[test]
    fn test_readers_never_see_partial_records() {
        let registry = Arc::new(TaskRegistry::new());
        let ids: Vec<TaskId> = (0..16).map(|i| registry.create(info(&format!("{i}.mp3")))).collect();
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let registry = registry.clone();
            let ids = ids.clone();
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    for id in &ids {
                        let record = registry.get(*id).unwrap();
                        if record.status == TaskStatus::Completed {
                            assert!(record.summary.is_some());
                            assert!(record.transcription.is_some());
                        }
                        if record.status == TaskStatus::Transcribing {
                            assert!(record.persistent_path.is_some());
                        }
                    }
                }
            })
        };

        for id in &ids {
            registry.update(*id, |r| r.begin_upload()).unwrap();
            registry
                .update(*id, |r| r.record_relocation(PathBuf::from("/tmp/x.mp3")))
                .unwrap();
            registry
                .update(*id, |r| {
                    r.record_transcript(
                        Transcript {
                            text: "hello".to_string(),
                            language: None,
                            duration: None,
                            confidence: None,
                        },
                        PipelineMode::OneShot,
                    )
                })
                .unwrap();
            registry
                .update(*id, |r| {
                    r.record_summary(MeetingSummary {
                        summary: "short".to_string(),
                        ..MeetingSummary::default()
                    })
                })
                .unwrap();
        }

        done.store(true, Ordering::Relaxed);
        reader.join().unwrap();
        assert!(registry
            .list()
            .iter()
            .all(|r| r.status == TaskStatus::Completed));
    }
}
