use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{NewTrainingNeed, RequestId, RequestNumber, TrainingNeedRecord};
use super::repository::{
    RepositoryError, RequestFilter, SortOrder, StatusUpdate, TrainingNeedRepository,
};

#[derive(Debug, Default)]
struct StoreState {
    next_sequence: u64,
    records: HashMap<RequestId, (u64, TrainingNeedRecord)>,
    numbers: HashMap<RequestNumber, RequestId>,
}

/// Process-local request store. One mutex guards every read-check-write, which is what makes
/// the conditional status update atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTrainingNeedRepository {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryTrainingNeedRepository {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".to_string()))
    }

    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.len()? == 0)
    }
}

impl TrainingNeedRepository for InMemoryTrainingNeedRepository {
    fn create(&self, record: NewTrainingNeed) -> Result<TrainingNeedRecord, RepositoryError> {
        let mut state = self.lock()?;
        if state.numbers.contains_key(&record.request_number) {
            return Err(RepositoryError::DuplicateRequestNumber(record.request_number));
        }

        state.next_sequence += 1;
        let sequence = state.next_sequence;
        let id = RequestId(format!("tn-{sequence:06}"));
        let now = Utc::now();
        let stored = TrainingNeedRecord {
            id: id.clone(),
            request_number: record.request_number,
            submitter: record.submitter,
            department: record.department,
            assigned_manager: record.assigned_manager,
            payload: record.payload,
            status: record.status,
            audit: Default::default(),
            created_at: now,
            updated_at: now,
        };

        state
            .numbers
            .insert(stored.request_number.clone(), id.clone());
        state.records.insert(id, (sequence, stored.clone()));
        Ok(stored)
    }

    fn get_by_id(&self, id: &RequestId) -> Result<Option<TrainingNeedRecord>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.records.get(id).map(|(_, record)| record.clone()))
    }

    fn get_by_request_number(
        &self,
        number: &RequestNumber,
    ) -> Result<Option<TrainingNeedRecord>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .numbers
            .get(number)
            .and_then(|id| state.records.get(id))
            .map(|(_, record)| record.clone()))
    }

    fn find(
        &self,
        filter: &RequestFilter,
        sort: SortOrder,
    ) -> Result<Vec<TrainingNeedRecord>, RepositoryError> {
        let state = self.lock()?;
        let mut matches: Vec<_> = state
            .records
            .values()
            .filter(|(_, record)| filter.matches(record))
            .collect();

        matches.sort_by(|(left_seq, left), (right_seq, right)| {
            let oldest_first = left
                .created_at
                .cmp(&right.created_at)
                .then(left_seq.cmp(right_seq));
            match sort {
                SortOrder::OldestFirst => oldest_first,
                SortOrder::NewestFirst => oldest_first.reverse(),
            }
        });

        Ok(matches
            .into_iter()
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn update_status_and_audit(
        &self,
        id: &RequestId,
        update: StatusUpdate,
    ) -> Result<TrainingNeedRecord, RepositoryError> {
        let mut state = self.lock()?;
        let (_, record) = state.records.get_mut(id).ok_or(RepositoryError::NotFound)?;

        if record.status != update.expected {
            return Err(RepositoryError::StatusMismatch {
                expected: update.expected,
                actual: record.status,
            });
        }
        if record.audit.reviewer(update.stage).is_some() {
            return Err(RepositoryError::AuditAlreadyRecorded(update.stage));
        }

        record.audit.record(update.stage, update.reviewer);
        record.status = update.next;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    fn delete(&self, id: &RequestId) -> Result<TrainingNeedRecord, RepositoryError> {
        let mut state = self.lock()?;
        let (_, record) = state.records.remove(id).ok_or(RepositoryError::NotFound)?;
        state.numbers.remove(&record.request_number);
        Ok(record)
    }
}
