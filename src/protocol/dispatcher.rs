//! Inbound frame demultiplexer.
//!
//! Many logical streams share one physical reader. A thread that wants a
//! `(local_id, command)` frame first checks that id's mailbox; if nothing is
//! queued it tries to take the single reader token and read one frame on
//! everyone's behalf, otherwise it waits on the condition variable until the
//! current reader has routed a frame.
//!
//! Lock order is always `state` then `source` (the token is only ever
//! `try_lock`ed while `state` is held), and the token is released while
//! `state` is held so no waiter can miss the wake-up.

use std::collections::{HashMap, VecDeque};
use std::io::{ErrorKind, Read};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, TryLockError};
use tracing::{debug, trace, warn};

use crate::core::packet::{command, Frame};
use crate::error::{AdbError, Result};
use crate::transport::reader::FrameReader;
use crate::utils::metrics::Metrics;

/// What the queue needs to know to route a message.
pub trait Routable {
    /// Id of the local stream the message is addressed to.
    fn local_id(&self) -> u32;
    fn command(&self) -> u32;
    /// Whether the message ends the stream instead of being queued.
    fn is_close(&self) -> bool;
}

impl Routable for Frame {
    fn local_id(&self) -> u32 {
        self.arg1
    }

    fn command(&self) -> u32 {
        self.command
    }

    fn is_close(&self) -> bool {
        self.command == command::CLSE
    }
}

/// Blocking producer of inbound messages. Only ever called by the thread
/// holding the reader token.
pub trait MessageSource: Send {
    type Message: Routable + Send;

    fn read_message(&mut self) -> Result<Self::Message>;
}

impl<R: Read + Send> MessageSource for FrameReader<R> {
    type Message = Frame;

    fn read_message(&mut self) -> Result<Frame> {
        FrameReader::read_message(self)
    }
}

struct Mailbox<M> {
    live: bool,
    queues: HashMap<u32, VecDeque<M>>,
}

impl<M> Mailbox<M> {
    fn new() -> Self {
        Self {
            live: true,
            queues: HashMap::new(),
        }
    }
}

struct QueueState<M> {
    mailboxes: HashMap<u32, Mailbox<M>>,
    disconnected: bool,
}

pub struct MessageQueue<S: MessageSource> {
    source: Mutex<S>,
    state: Mutex<QueueState<S::Message>>,
    cond: Condvar,
    metrics: Arc<Metrics>,
}

/// Read timeouts leave the connection usable; the caller sees the error and
/// may retry.
fn is_transient(err: &AdbError) -> bool {
    matches!(err, AdbError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut))
}

impl<S: MessageSource> MessageQueue<S> {
    pub fn new(source: S) -> Self {
        Self::with_metrics(source, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(source: S, metrics: Arc<Metrics>) -> Self {
        Self {
            source: Mutex::new(source),
            state: Mutex::new(QueueState {
                mailboxes: HashMap::new(),
                disconnected: false,
            }),
            cond: Condvar::new(),
            metrics,
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, QueueState<S::Message>>> {
        self.state.lock().map_err(|_| AdbError::LockPoisoned)
    }

    /// Register `local_id` with a fresh, live mailbox.
    pub fn start_listening(&self, local_id: u32) -> Result<()> {
        let mut state = self.lock_state()?;
        if state.mailboxes.insert(local_id, Mailbox::new()).is_some() {
            warn!(local_id = format_args!("{local_id:x}"), "Replaced existing mailbox");
        }
        Ok(())
    }

    /// Drop `local_id`'s mailbox. Waiters on it fail with `StreamClosed`;
    /// later frames for it are discarded.
    pub fn stop_listening(&self, local_id: u32) -> Result<()> {
        let mut state = self.lock_state()?;
        state.mailboxes.remove(&local_id);
        self.cond.notify_all();
        Ok(())
    }

    /// Drop queued `command` messages for `local_id` without blocking.
    /// Returns how many were discarded.
    pub fn discard(&self, local_id: u32, command: u32) -> Result<usize> {
        let mut state = self.lock_state()?;
        Ok(state
            .mailboxes
            .get_mut(&local_id)
            .and_then(|mailbox| mailbox.queues.remove(&command))
            .map_or(0, |queue| queue.len()))
    }

    /// False once the device closed `local_id`, the connection died, or the
    /// id was never registered.
    pub fn is_live(&self, local_id: u32) -> Result<bool> {
        Ok(self
            .lock_state()?
            .mailboxes
            .get(&local_id)
            .is_some_and(|mailbox| mailbox.live))
    }

    pub fn is_listening(&self, local_id: u32) -> Result<bool> {
        Ok(self.lock_state()?.mailboxes.contains_key(&local_id))
    }

    /// Number of registered ids.
    pub fn listening_count(&self) -> Result<usize> {
        Ok(self.lock_state()?.mailboxes.len())
    }

    /// Mark the connection dead: every mailbox becomes non-live and all
    /// waiters wake. Does not interrupt a thread blocked inside the source;
    /// shut the transport down for that.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        Self::disconnect(&mut state);
        self.cond.notify_all();
        Ok(())
    }

    pub fn is_shutdown(&self) -> Result<bool> {
        Ok(self.lock_state()?.disconnected)
    }

    fn disconnect(state: &mut QueueState<S::Message>) {
        state.disconnected = true;
        for mailbox in state.mailboxes.values_mut() {
            mailbox.live = false;
        }
    }

    /// Block until a `command` message for `local_id` is available.
    ///
    /// # Errors
    /// - `NotListening` if `local_id` is not registered on entry
    /// - `StreamClosed` once the id is non-live or unregistered with nothing
    ///   matching queued
    /// - `ConnectionClosed` if the queue was shut down
    /// - any error from the source while this thread held the reader token
    pub fn take(&self, local_id: u32, command: u32) -> Result<S::Message> {
        let mut state = self.lock_state()?;
        if !state.mailboxes.contains_key(&local_id) {
            return Err(AdbError::NotListening(local_id));
        }

        loop {
            let Some(mailbox) = state.mailboxes.get_mut(&local_id) else {
                return Err(AdbError::StreamClosed(local_id));
            };
            if let Some(message) = mailbox
                .queues
                .get_mut(&command)
                .and_then(VecDeque::pop_front)
            {
                return Ok(message);
            }
            if !mailbox.live {
                return Err(AdbError::StreamClosed(local_id));
            }
            if state.disconnected {
                return Err(AdbError::ConnectionClosed);
            }

            match self.source.try_lock() {
                Ok(mut source) => {
                    drop(state);
                    let read = source.read_message();
                    state = self.lock_state()?;

                    let outcome = match read {
                        Ok(message) => {
                            self.route(&mut state, message);
                            Ok(())
                        }
                        Err(e) if is_transient(&e) => Err(e),
                        Err(e) => {
                            debug!(error = %e, "Transport read failed, closing all streams");
                            Self::disconnect(&mut state);
                            Err(e)
                        }
                    };

                    drop(source);
                    self.cond.notify_all();
                    outcome?;
                }
                Err(TryLockError::WouldBlock) => {
                    state = self.cond.wait(state).map_err(|_| AdbError::LockPoisoned)?;
                }
                Err(TryLockError::Poisoned(_)) => return Err(AdbError::LockPoisoned),
            }
        }
    }

    fn route(&self, state: &mut QueueState<S::Message>, message: S::Message) {
        let local_id = message.local_id();
        match state.mailboxes.get_mut(&local_id) {
            Some(mailbox) if message.is_close() => mailbox.live = false,
            Some(mailbox) => mailbox
                .queues
                .entry(message.command())
                .or_default()
                .push_back(message),
            None => {
                trace!(
                    local_id = format_args!("{local_id:x}"),
                    command = command::name(message.command()),
                    "Dropping message for unregistered id"
                );
                self.metrics.frame_dropped();
            }
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}
