//! Buffer policies and capacity-checked job storage.

use crate::error::InvariantViolation;
use crate::id::JobId;
use crate::instance::{BufferConfig, BufferType};
use crate::state::{BufferState, BufferStatus};

impl BufferState {
    /// The job this buffer offers without being told which one.
    ///
    /// FIFO and DUMMY offer the oldest job, LIFO the newest, FLEX none.
    pub fn exposed(&self, kind: BufferType) -> Option<JobId> {
        match kind {
            BufferType::Fifo | BufferType::Dummy => self.store.first().copied(),
            BufferType::Lifo => self.store.last().copied(),
            BufferType::Flex => None,
        }
    }

    /// Whether `job` may leave this buffer now. FLEX releases any stored job
    /// that is named explicitly; the other policies only their exposed one.
    pub fn can_release(&self, kind: BufferType, job: JobId) -> bool {
        match kind {
            BufferType::Flex => self.contains(job),
            _ => self.exposed(kind) == Some(job),
        }
    }

    pub fn has_space(&self, config: &BufferConfig) -> bool {
        self.store.len() < config.capacity as usize
    }

    pub fn push(&mut self, config: &BufferConfig, job: JobId) -> Result<(), InvariantViolation> {
        if !self.has_space(config) {
            return Err(InvariantViolation::BufferOverflow {
                buffer: self.id,
                capacity: config.capacity,
            });
        }
        self.store.push(job);
        self.refresh_status(config);
        Ok(())
    }

    pub fn remove(&mut self, config: &BufferConfig, job: JobId) -> Result<(), InvariantViolation> {
        let index = self
            .store
            .iter()
            .position(|j| *j == job)
            .ok_or(InvariantViolation::JobNotFound {
                job,
                buffer: self.id,
            })?;
        self.store.remove(index);
        self.refresh_status(config);
        Ok(())
    }

    fn refresh_status(&mut self, config: &BufferConfig) {
        self.status = if self.store.is_empty() {
            BufferStatus::Empty
        } else if self.store.len() >= config.capacity as usize {
            BufferStatus::Full
        } else {
            BufferStatus::NotEmpty
        };
    }
}
