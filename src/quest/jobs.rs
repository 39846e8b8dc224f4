use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Short ad-hoc contract handed out by the job board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub label: String,
    pub reward: u32,
}

impl Job {
    pub fn new(id: impl Into<String>, label: impl Into<String>, reward: u32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            reward,
        }
    }
}

/// Outcome of asking the board for work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// A contract is already running.
    Busy(Job),
    /// The queue is empty.
    Exhausted,
    Assigned(Job),
}

/// FIFO queue of contracts with at most one active at a time.
#[derive(Debug, Clone, Default)]
pub struct JobBoard {
    queue: VecDeque<Job>,
    active: Option<Job>,
}

impl JobBoard {
    pub fn new(jobs: impl IntoIterator<Item = Job>) -> Self {
        Self {
            queue: jobs.into_iter().collect(),
            active: None,
        }
    }

    pub fn assign(&mut self) -> Assignment {
        if let Some(active) = &self.active {
            return Assignment::Busy(active.clone());
        }
        match self.queue.pop_front() {
            Some(job) => {
                self.active = Some(job.clone());
                Assignment::Assigned(job)
            }
            None => Assignment::Exhausted,
        }
    }

    pub fn active(&self) -> Option<&Job> {
        self.active.as_ref()
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        self.active.as_ref().is_some_and(|job| job.id == job_id)
    }

    /// Clears the active contract.
    pub fn finish(&mut self) -> Option<Job> {
        self.active.take()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Job> {
        self.queue.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> JobBoard {
        JobBoard::new([Job::new("a", "First", 3), Job::new("b", "Second", 4)])
    }

    #[test]
    fn hands_out_jobs_in_order_one_at_a_time() {
        let mut board = board();
        assert_eq!(board.assign(), Assignment::Assigned(Job::new("a", "First", 3)));
        assert_eq!(board.assign(), Assignment::Busy(Job::new("a", "First", 3)));
        assert!(board.is_active("a"));
        board.finish();
        assert_eq!(board.assign(), Assignment::Assigned(Job::new("b", "Second", 4)));
        board.finish();
        assert_eq!(board.assign(), Assignment::Exhausted);
        assert!(board.active().is_none());
        assert_eq!(board.pending().count(), 0);
    }
}
