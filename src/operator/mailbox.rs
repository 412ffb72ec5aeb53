use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Default capacity of an actor mailbox.
pub const MAILBOX_CAPACITY: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskError {
    #[error("actor mailbox is closed")]
    Closed,

    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

/// Send a message carrying a reply channel and wait for the answer.
pub async fn call<M, R>(
    mailbox: &mpsc::Sender<M>,
    message: impl FnOnce(oneshot::Sender<R>) -> M,
) -> Result<R, AskError> {
    let (reply, response) = oneshot::channel();
    mailbox
        .send(message(reply))
        .await
        .map_err(|_| AskError::Closed)?;
    response.await.map_err(|_| AskError::Closed)
}

/// Like [`call`], but gives up after `timeout`.
pub async fn ask<M, R>(
    mailbox: &mpsc::Sender<M>,
    timeout: Duration,
    message: impl FnOnce(oneshot::Sender<R>) -> M,
) -> Result<R, AskError> {
    tokio::time::timeout(timeout, call(mailbox, message))
        .await
        .map_err(|_| AskError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping(oneshot::Sender<&'static str>);

    #[tokio::test]
    async fn ask_returns_reply() {
        let (tx, mut rx) = mpsc::channel::<Ping>(1);
        tokio::spawn(async move {
            while let Some(Ping(reply)) = rx.recv().await {
                let _ = reply.send("pong");
            }
        });

        let answer = ask(&tx, Duration::from_secs(1), Ping).await.unwrap();
        assert_eq!(answer, "pong");
    }

    #[tokio::test]
    async fn ask_to_stopped_actor_is_closed() {
        let (tx, rx) = mpsc::channel::<Ping>(1);
        drop(rx);
        assert_eq!(
            ask(&tx, Duration::from_secs(1), Ping).await.unwrap_err(),
            AskError::Closed
        );
    }

    #[tokio::test]
    async fn dropped_reply_is_closed() {
        let (tx, mut rx) = mpsc::channel::<Ping>(1);
        tokio::spawn(async move {
            while let Some(Ping(reply)) = rx.recv().await {
                drop(reply);
            }
        });
        assert_eq!(call(&tx, Ping).await.unwrap_err(), AskError::Closed);
    }

    #[tokio::test]
    async fn silent_actor_times_out() {
        let (tx, _rx) = mpsc::channel::<Ping>(1);
        let timeout = Duration::from_millis(20);
        assert_eq!(
            ask(&tx, timeout, Ping).await.unwrap_err(),
            AskError::Timeout(timeout)
        );
    }
}
