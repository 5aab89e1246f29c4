use futures_timer::Delay;
use futures_util::ready;
use pin_project::pin_project;

use ethers_core::types::H256;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use crate::{
    rpc::{self, Execution},
    ClientError, RelayClient,
};

/// Relay Task error
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Relay client
    #[error("{0}")]
    Client(#[from] ClientError),
    /// cancelled by backend
    #[error("Cancelled by backend")]
    Cancelled {
        /// Message from the last check
        message: Option<String>,
    },
    /// Reverted
    #[error("Execution Reverted")]
    Reverted {
        /// execution, if the reverting transaction was mined
        execution: Option<Execution>,
        /// Message from the last check. Usually the revert reason
        message: Option<String>,
    },
    /// Not found
    #[error("Dropped by backend")]
    NotFound,
    /// Too many retries
    #[error("Backend returned too many error responses")]
    TooManyRetries,
}

// convenience
type PinBoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a status means for a waiting caller
#[derive(Debug)]
pub(crate) enum Outcome {
    /// Keep polling
    Pending,
    /// The backend returned nothing usable
    Undefined,
    /// Terminal
    Done(Result<Execution, TaskError>),
}

pub(crate) fn interpret(status: Option<rpc::TransactionStatus>) -> Outcome {
    let status = match status {
        Some(status) => status,
        None => return Outcome::Undefined,
    };

    match status.task_state {
        rpc::TaskState::ExecSuccess => match status.execution() {
            Some(execution) => Outcome::Done(Ok(execution)),
            None => Outcome::Undefined,
        },
        rpc::TaskState::ExecReverted => Outcome::Done(Err(TaskError::Reverted {
            execution: status.execution(),
            message: status.last_check_message,
        })),
        rpc::TaskState::Cancelled => Outcome::Done(Err(TaskError::Cancelled {
            message: status.last_check_message,
        })),
        rpc::TaskState::NotFound => Outcome::Done(Err(TaskError::NotFound)),
        _ => Outcome::Pending,
    }
}

/// A pending relay task
///
/// Retries are decremented when the server returns no status, indicating a
/// potentially recoverable backend error. Unrecoverable backend errors (e.g.
/// deserialization errors or HTTP 500-series statuses) are not retried.
#[pin_project(project = TaskProj)]
pub struct RelayTask<'a> {
    /// Task Id
    id: H256,
    /// Client
    client: &'a RelayClient,
    /// task state
    state: TaskState<'a>,
    /// retries
    retries: usize,
    /// delay between requests
    delay: Duration,
}

const DEFAULT_RETRIES: usize = 5;
const DEFAULT_DELAY: u64 = 15;

enum TaskState<'a> {
    /// Initial delay to ensure the GettingTx loop doesn't immediately fail
    Delaying(Pin<Box<Delay>>),
    ///
    Requesting(PinBoxFut<'a, Result<Option<rpc::TransactionStatus>, ClientError>>),
}

impl<'a> std::fmt::Debug for RelayTask<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayTask")
            .field("id", &self.id)
            .field("retries", &self.retries)
            .finish()
    }
}

impl<'a> RelayTask<'a> {
    /// Instantiate a Task
    pub fn new(id: H256, client: &'a RelayClient) -> Self {
        let delay = Duration::from_secs(DEFAULT_DELAY);
        Self {
            id,
            client,
            state: TaskState::Delaying(Box::pin(Delay::new(delay))),
            retries: DEFAULT_RETRIES,
            delay,
        }
    }

    /// The task id
    pub fn id(&self) -> H256 {
        self.id
    }

    /// Set the number of retries. Retries are decremented when the server
    /// returns no status
    #[must_use]
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the polling delay (the time between poll attempts)
    #[must_use]
    pub fn polling_interval<T: Into<Duration>>(mut self, duration: T) -> Self {
        self.delay = duration.into();

        if matches!(self.state, TaskState::Delaying(_)) {
            self.state = TaskState::Delaying(Box::pin(Delay::new(self.delay)))
        }

        self
    }
}

impl RelayClient {
    /// Track a submitted task until it reaches a terminal state
    pub fn task(&self, task_id: H256) -> RelayTask<'_> {
        RelayTask::new(task_id, self)
    }
}

macro_rules! make_request {
    ($cx:ident, $this:ident) => {
        *$this.state = TaskState::Requesting(Box::pin($this.client.get_task_status(*$this.id)));
        $cx.waker().wake_by_ref();
        return Poll::Pending
    };
}

macro_rules! delay_it {
    ($cx:ident, $this:ident) => {
        *$this.state = TaskState::Delaying(Box::pin(Delay::new(*$this.delay)));
        $cx.waker().wake_by_ref();
        return Poll::Pending
    };
}

impl<'a> Future for RelayTask<'a> {
    type Output = Result<Execution, TaskError>;

    #[tracing::instrument(skip(self), fields(task_id = ?self.id, retries_remaining = self.retries))]
    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this: TaskProj = self.project();

        let status_fut = match this.state {
            TaskState::Delaying(delay) => {
                ready!(delay.as_mut().poll(cx));
                make_request!(cx, this);
            }
            TaskState::Requesting(fut) => fut,
        };

        let status = match ready!(status_fut.as_mut().poll(cx)) {
            Ok(status) => status,
            Err(e) => return Poll::Ready(Err(e.into())),
        };

        match interpret(status) {
            Outcome::Done(result) => Poll::Ready(result),
            Outcome::Pending => {
                delay_it!(cx, this);
            }
            Outcome::Undefined => {
                tracing::warn!("Undefined status while polling task");
                if *this.retries == 0 {
                    return Poll::Ready(Err(TaskError::TooManyRetries));
                }
                *this.retries -= 1;
                delay_it!(cx, this);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rpc::{TaskState, TransactionStatus};
    use crate::test_utils::serve;
    use tracing_test::traced_test;

    fn status(task_state: TaskState) -> TransactionStatus {
        TransactionStatus {
            chain_id: 137,
            task_id: H256::repeat_byte(1),
            task_state,
            creation_date: "2023-05-02T10:21:03.201Z".to_owned(),
            last_check_date: None,
            last_check_message: Some("execution reverted: !permit".to_owned()),
            transaction_hash: None,
            block_number: None,
            execution_date: None,
        }
    }

    #[test]
    fn it_interprets_states() {
        assert!(matches!(interpret(None), Outcome::Undefined));
        assert!(matches!(
            interpret(Some(status(TaskState::CheckPending))),
            Outcome::Pending
        ));
        assert!(matches!(
            interpret(Some(status(TaskState::WaitingForConfirmation))),
            Outcome::Pending
        ));
        assert!(matches!(
            interpret(Some(status(TaskState::NotFound))),
            Outcome::Done(Err(TaskError::NotFound))
        ));
        assert!(matches!(
            interpret(Some(status(TaskState::Cancelled))),
            Outcome::Done(Err(TaskError::Cancelled { .. }))
        ));

        match interpret(Some(status(TaskState::ExecReverted))) {
            Outcome::Done(Err(TaskError::Reverted { execution, message })) => {
                assert_eq!(execution, None);
                assert_eq!(message.as_deref(), Some("execution reverted: !permit"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn success_needs_a_transaction() {
        let mut success = status(TaskState::ExecSuccess);
        assert!(matches!(interpret(Some(success.clone())), Outcome::Undefined));

        success.transaction_hash = Some(H256::repeat_byte(2));
        success.block_number = Some(10);
        match interpret(Some(success)) {
            Outcome::Done(Ok(execution)) => {
                assert_eq!(execution.transaction_hash, H256::repeat_byte(2));
                assert_eq!(execution.block_number, Some(10));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_errors_end_the_task() {
        // nothing listens on the discard port; requests fail fast
        let client = RelayClient::new("http://127.0.0.1:9/").unwrap();
        let task = client
            .task(H256::repeat_byte(1))
            .polling_interval(Duration::from_millis(1));

        assert!(matches!(task.await, Err(TaskError::Client(_))));
    }

    #[tokio::test]
    #[traced_test]
    async fn unknown_tasks_exhaust_the_retries() {
        let url = serve(r#"{"message": "Status not found"}"#).await;
        let client = RelayClient::new(url).unwrap();
        let task = client
            .task(H256::repeat_byte(1))
            .retries(1)
            .polling_interval(Duration::from_millis(1));

        assert!(matches!(task.await, Err(TaskError::TooManyRetries)));
        assert!(logs_contain("Undefined status while polling task"));
    }
}
