use crossbeam::channel::{unbounded, Receiver, Sender};
use thiserror::Error;

/// Application-level events consumed by the manager run loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationEvent {
    /// The process was asked to stop (Ctrl-C or service stop).
    StopRequested,
}

pub struct EventPublisher<E>(Sender<E>);

pub struct EventConsumer<E>(Receiver<E>);

#[derive(Debug, Error, PartialEq)]
pub enum EventPublisherError {
    #[error("error while publishing event: {0}")]
    SendError(String),
}

/// Creates a connected publisher/consumer pair over an unbounded channel.
pub fn pub_sub<E>() -> (EventPublisher<E>, EventConsumer<E>) {
    let (s, r) = unbounded();
    (EventPublisher(s), EventConsumer(r))
}

impl<E> EventPublisher<E> {
    pub fn publish(&self, event: E) -> Result<(), EventPublisherError> {
        self.0
            .send(event)
            .map_err(|err| EventPublisherError::SendError(err.to_string()))
    }
}

impl<E> Clone for EventPublisher<E> {
    fn clone(&self) -> Self {
        EventPublisher(self.0.clone())
    }
}

impl<E> AsRef<Receiver<E>> for EventConsumer<E> {
    fn as_ref(&self) -> &Receiver<E> {
        &self.0
    }
}
