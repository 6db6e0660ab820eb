//! Per-job change notification channels.

use std::collections::HashMap;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::error::NotificationError;
use crate::job::{DesignJob, JobId};

/// Live feed of full job records for one job id.
///
/// Every committed change arrives in commit order. The feed closes after the
/// record reaches a terminal status; dropping the subscription unsubscribes.
pub struct JobSubscription {
    job_id: JobId,
    receiver: broadcast::Receiver<DesignJob>,
}

impl JobSubscription {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Waits for the next change.
    pub async fn recv(&mut self) -> Result<DesignJob, NotificationError> {
        self.receiver.recv().await.map_err(|e| match e {
            RecvError::Lagged(missed) => NotificationError::Lagged(missed),
            RecvError::Closed => NotificationError::Closed,
        })
    }

    /// Returns the next buffered change, or `None` if nothing is pending.
    pub fn try_recv(&mut self) -> Result<Option<DesignJob>, NotificationError> {
        match self.receiver.try_recv() {
            Ok(job) => Ok(Some(job)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Lagged(missed)) => Err(NotificationError::Lagged(missed)),
            Err(TryRecvError::Closed) => Err(NotificationError::Closed),
        }
    }
}

/// Broadcast senders keyed by job id.
///
/// Senders are created on first subscription and dropped once the job
/// finishes or has no receivers left.
pub(crate) struct JobNotifier {
    capacity: usize,
    senders: HashMap<JobId, broadcast::Sender<DesignJob>>,
}

impl JobNotifier {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: HashMap::new(),
        }
    }

    /// Opens a feed for `job`. A finished job gets an already closed feed.
    pub(crate) fn subscribe(&mut self, job: &DesignJob) -> JobSubscription {
        if job.is_finished() {
            let (sender, receiver) = broadcast::channel(1);
            drop(sender);
            return JobSubscription {
                job_id: job.id,
                receiver,
            };
        }

        let capacity = self.capacity;
        let sender = self
            .senders
            .entry(job.id)
            .or_insert_with(|| broadcast::channel(capacity).0);
        JobSubscription {
            job_id: job.id,
            receiver: sender.subscribe(),
        }
    }

    /// Sends the committed record to every subscriber of its job.
    pub(crate) fn publish(&mut self, job: &DesignJob) {
        let Some(sender) = self.senders.get(&job.id) else {
            return;
        };
        // No receivers left is fine.
        let _ = sender.send(job.clone());

        if job.is_finished() || sender.receiver_count() == 0 {
            self.senders.remove(&job.id);
        }
    }

    #[cfg(test)]
    pub(crate) fn channel_count(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let mut notifier = JobNotifier::new(4);
        let job = DesignJob::new("make it denim");
        notifier.publish(&job);
        assert_eq!(notifier.channel_count(), 0);
    }

    #[test]
    fn test_every_subscriber_receives_each_change() {
        let mut notifier = JobNotifier::new(4);
        let job = DesignJob::new("make it denim");
        let mut first = notifier.subscribe(&job);
        let mut second = notifier.subscribe(&job);

        notifier.publish(&job);

        assert_eq!(first.try_recv().unwrap().unwrap().id, job.id);
        assert_eq!(second.try_recv().unwrap().unwrap().id, job.id);
        assert_eq!(first.try_recv().unwrap(), None);
    }

    #[test]
    fn test_finished_publish_closes_feed_after_delivery() {
        let mut notifier = JobNotifier::new(4);
        let mut job = DesignJob::new("make it denim");
        let mut sub = notifier.subscribe(&job);

        job.status = JobStatus::Completed;
        notifier.publish(&job);

        assert_eq!(
            sub.try_recv().unwrap().unwrap().status,
            JobStatus::Completed
        );
        assert_eq!(sub.try_recv(), Err(NotificationError::Closed));
        assert_eq!(notifier.channel_count(), 0);
    }

    #[test]
    fn test_subscribe_to_finished_job_is_closed() {
        let mut notifier = JobNotifier::new(4);
        let mut job = DesignJob::new("make it denim");
        job.status = JobStatus::Error;

        let mut sub = notifier.subscribe(&job);
        assert_eq!(sub.try_recv(), Err(NotificationError::Closed));
    }

    #[test]
    fn test_dropped_subscribers_release_channel() {
        let mut notifier = JobNotifier::new(4);
        let job = DesignJob::new("make it denim");
        let sub = notifier.subscribe(&job);
        assert_eq!(notifier.channel_count(), 1);

        drop(sub);
        notifier.publish(&job);
        assert_eq!(notifier.channel_count(), 0);
    }

    #[test]
    fn test_slow_subscriber_lags() {
        let mut notifier = JobNotifier::new(2);
        let job = DesignJob::new("make it denim");
        let mut sub = notifier.subscribe(&job);

        for _ in 0..5 {
            notifier.publish(&job);
        }

        assert_eq!(sub.try_recv(), Err(NotificationError::Lagged(3)));
        assert!(sub.try_recv().unwrap().is_some());
    }
}
