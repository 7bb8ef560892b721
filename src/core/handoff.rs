//! Rendezvous channel between a collector and its publisher.
//!
//! `send` returns only after the receiver has taken the value, so a producer
//! can never run more than one snapshot ahead of its consumer.

use tokio::sync::{mpsc, oneshot};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HandoffError {
    #[error("handoff receiver is gone")]
    Closed,
}

struct Envelope<T> {
    value: T,
    taken: oneshot::Sender<()>,
}

pub struct HandoffSender<T> {
    tx: mpsc::Sender<Envelope<T>>,
}

pub struct HandoffReceiver<T> {
    rx: mpsc::Receiver<Envelope<T>>,
}

pub fn channel<T>() -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (HandoffSender { tx }, HandoffReceiver { rx })
}

impl<T> HandoffSender<T> {
    /// Hands `value` over and waits until the receiver has taken it.
    ///
    /// Dropping the future abandons the send. A value that already reached
    /// the queue may still be received.
    pub async fn send(&self, value: T) -> Result<(), HandoffError> {
        let (taken, taken_rx) = oneshot::channel();
        self.tx
            .send(Envelope { value, taken })
            .await
            .map_err(|_| HandoffError::Closed)?;
        taken_rx.await.map_err(|_| HandoffError::Closed)
    }
}

impl<T> HandoffReceiver<T> {
    /// `None` once the sender is dropped and nothing is pending.
    pub async fn recv(&mut self) -> Option<T> {
        let Envelope { value, taken } = self.rx.recv().await?;
        // the sender may have given up already
        let _ = taken.send(());
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_send_waits_for_receiver() {
        let (tx, mut rx) = channel::<u32>();

        let pending = timeout(Duration::from_millis(50), tx.send(1)).await;
        assert!(pending.is_err(), "send must block without a receiver");

        let sender = tokio::spawn(async move { tx.send(2).await });
        // the abandoned send left its value queued
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(sender.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_send_fails_when_receiver_dropped() {
        let (tx, rx) = channel::<u32>();
        drop(rx);
        assert_eq!(tx.send(1).await, Err(HandoffError::Closed));
    }

    #[tokio::test]
    async fn test_recv_none_after_sender_dropped() {
        let (tx, mut rx) = channel::<u32>();
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = channel::<u32>();
        let producer = tokio::spawn(async move {
            for i in 0..5 {
                tx.send(i).await.unwrap();
            }
        });

        let mut received = Vec::new();
        while let Some(v) = rx.recv().await {
            received.push(v);
        }
        producer.await.unwrap();
        assert_eq!(received, [0, 1, 2, 3, 4]);
    }
}
