//! In-memory status store: job id -> record, group id -> record.
//!
//! Each map sits behind its own reader/writer lock. A single record is always
//! updated inside one critical section; operations spanning several records
//! (group folds, bulk cleanup) are not atomic as a whole.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{QueueError, QueueResult};
use crate::types::{GroupId, GroupRecord, GroupStatus, JobId, JobRecord, StatusCounts};

#[derive(Debug, Default)]
pub struct StatusStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    groups: RwLock<HashMap<GroupId, GroupRecord>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_job(&self, job: JobRecord) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id, job);
    }

    pub fn insert_group(&self, group: GroupRecord) {
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group.id, group);
    }

    /// Snapshot of one job.
    pub fn job(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Snapshot of one group record (membership, not status).
    pub fn group(&self, id: &GroupId) -> Option<GroupRecord> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// All jobs in admission order (by `seq`).
    pub fn list_jobs(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<JobRecord> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Mutate one job under the write lock. Returns the closure's result,
    /// or None if the job is not present.
    pub fn update_job<R>(&self, id: &JobId, f: impl FnOnce(&mut JobRecord) -> R) -> Option<R> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
            .map(f)
    }

    /// Remove a job only if it is in a terminal state (check and removal
    /// happen under the same lock).
    pub fn remove_terminal_job(&self, id: &JobId) -> QueueResult<JobRecord> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let status = jobs
            .get(id)
            .map(|j| j.status)
            .ok_or(QueueError::JobNotFound(*id))?;
        if !status.is_terminal() {
            return Err(QueueError::JobActive { id: *id, status });
        }
        jobs.remove(id).ok_or(QueueError::JobNotFound(*id))
    }

    /// Remove every terminal job; returns their ids.
    pub fn remove_all_terminal_jobs(&self) -> Vec<JobId> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let ids: Vec<JobId> = jobs
            .values()
            .filter(|j| j.status.is_terminal())
            .map(|j| j.id)
            .collect();
        for id in &ids {
            jobs.remove(id);
        }
        ids
    }

    pub fn remove_group(&self, id: &GroupId) -> Option<GroupRecord> {
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Remove groups none of whose members are still present; returns their ids.
    pub fn remove_empty_groups(&self) -> Vec<GroupId> {
        let candidates: Vec<(GroupId, Vec<JobId>)> = self
            .groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|g| (g.id, g.member_job_ids.clone()))
            .collect();

        let mut removed = Vec::new();
        for (group_id, members) in candidates {
            let remaining = {
                let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
                members.iter().filter(|id| jobs.contains_key(id)).count()
            };
            if remaining == 0 && self.remove_group(&group_id).is_some() {
                removed.push(group_id);
            }
        }
        removed
    }

    /// Fold the current state of every present member into per-state counts.
    pub fn group_status(&self, id: &GroupId) -> Option<GroupStatus> {
        let group = self.group(id)?;
        let mut statuses = StatusCounts::default();
        {
            let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
            for job_id in &group.member_job_ids {
                if let Some(job) = jobs.get(job_id) {
                    statuses.add(job.status);
                }
            }
        }
        Some(GroupStatus {
            id: group.id,
            title: group.title,
            total: group.expected_count,
            statuses,
            thumbnail: group.thumbnail,
            quality: group.quality,
            format_kind: group.format_kind,
        })
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn group_count(&self) -> usize {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormatKind, JobStatus, PlaylistSlot, Quality};

    fn job(title: &str) -> JobRecord {
        JobRecord::queued(
            JobId::new(),
            format!("https://example.com/{title}"),
            title.to_string(),
            None,
            0,
            Quality::Best,
            FormatKind::Video,
            "Starting soon...".to_string(),
        )
    }

    fn group_of(store: &StatusStore, n: usize) -> (GroupId, Vec<JobId>) {
        let group_id = GroupId::new();
        let mut ids = Vec::new();
        let base = store.job_count() as u64;
        for i in 0..n {
            let mut j = job(&format!("item{i}"));
            j.seq = base + i as u64;
            j.playlist = Some(PlaylistSlot {
                group_id,
                group_title: "list".to_string(),
                index: i + 1,
                count: n,
            });
            ids.push(j.id);
            store.insert_job(j);
        }
        store.insert_group(GroupRecord {
            id: group_id,
            title: "list".to_string(),
            expected_count: n,
            thumbnail: None,
            quality: Quality::Best,
            format_kind: FormatKind::Video,
            member_job_ids: ids.clone(),
        });
        (group_id, ids)
    }

    fn finish(store: &StatusStore, id: &JobId) {
        store.update_job(id, |j| {
            j.begin_download();
            j.complete("out.mp4".to_string());
        });
    }

    #[test]
    fn update_returns_none_for_unknown_job() {
        let store = StatusStore::new();
        assert!(store.update_job(&JobId::new(), |j| j.begin_download()).is_none());
    }

    #[test]
    fn remove_terminal_job_rejects_active() {
        let store = StatusStore::new();
        let j = job("a");
        let id = j.id;
        store.insert_job(j);

        let err = store.remove_terminal_job(&id).unwrap_err();
        assert!(matches!(err, QueueError::JobActive { status: JobStatus::Queued, .. }));

        store.update_job(&id, |j| j.begin_download());
        let err = store.remove_terminal_job(&id).unwrap_err();
        assert!(matches!(err, QueueError::JobActive { status: JobStatus::Downloading, .. }));

        store.update_job(&id, |j| j.complete("a.mp4".to_string()));
        let removed = store.remove_terminal_job(&id).unwrap();
        assert_eq!(removed.output_file.as_deref(), Some("a.mp4"));
        assert!(store.job(&id).is_none());
        assert!(matches!(
            store.remove_terminal_job(&id),
            Err(QueueError::JobNotFound(_))
        ));
    }

    #[test]
    fn group_status_counts_present_members_only() {
        let store = StatusStore::new();
        let (gid, ids) = group_of(&store, 4);
        finish(&store, &ids[0]);
        store.update_job(&ids[1], |j| j.begin_download());

        let status = store.group_status(&gid).unwrap();
        assert_eq!(status.total, 4);
        assert_eq!(status.statuses.completed, 1);
        assert_eq!(status.statuses.downloading, 1);
        assert_eq!(status.statuses.queued, 2);
        assert_eq!(status.statuses.total(), 4);

        store.remove_terminal_job(&ids[0]).unwrap();
        let status = store.group_status(&gid).unwrap();
        assert_eq!(status.statuses.total(), 3);
        assert_eq!(status.total, 4);
    }

    #[test]
    fn group_status_unknown_group() {
        let store = StatusStore::new();
        assert!(store.group_status(&GroupId::new()).is_none());
    }

    #[test]
    fn bulk_cleanup_removes_terminal_jobs_then_empty_groups() {
        let store = StatusStore::new();
        let (done_group, done_ids) = group_of(&store, 2);
        let (busy_group, busy_ids) = group_of(&store, 2);
        for id in &done_ids {
            finish(&store, id);
        }
        finish(&store, &busy_ids[0]);
        let single = job("single");
        let single_id = single.id;
        store.insert_job(single);

        let removed = store.remove_all_terminal_jobs();
        assert_eq!(removed.len(), 3);
        assert!(store.job(&single_id).is_some());

        let groups = store.remove_empty_groups();
        assert_eq!(groups, vec![done_group]);
        assert!(store.group(&busy_group).is_some());
        assert_eq!(store.group_count(), 1);
        assert_eq!(store.job_count(), 2);
    }

    #[test]
    fn list_keeps_playlist_order() {
        let store = StatusStore::new();
        let (_gid, ids) = group_of(&store, 5);
        let listed: Vec<JobId> = store.list_jobs().iter().map(|j| j.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn list_follows_sequence_not_insertion() {
        let store = StatusStore::new();
        let mut ids = Vec::new();
        for seq in [2u64, 0, 1] {
            let mut j = job(&format!("s{seq}"));
            j.seq = seq;
            ids.push((seq, j.id));
            store.insert_job(j);
        }
        ids.sort();
        let expected: Vec<JobId> = ids.into_iter().map(|(_, id)| id).collect();
        let listed: Vec<JobId> = store.list_jobs().iter().map(|j| j.id).collect();
        assert_eq!(listed, expected);
    }
}
