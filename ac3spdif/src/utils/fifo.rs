//! Bounded queue of timestamped input packets.
//!
//! The feeding side pushes packets and eventually signals end of stream,
//! stop or failure. The reading side blocks in [`PacketFifo::pop`] until a
//! packet is available or the queue leaves the running state.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::utils::clock::Mtime;
use crate::utils::errors::InputError;

/// One upstream packet (typically a PES payload).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8>,
    pub pts: Option<Mtime>,
}

impl Packet {
    pub fn new(data: Vec<u8>, pts: Option<Mtime>) -> Self {
        Self { data, pts }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    /// More packets may arrive.
    Running,
    /// No more packets will be pushed; queued ones are still delivered.
    EndOfStream,
    /// The host asked the reader to quit; queued packets are discarded.
    Stopped,
    /// Upstream failed; queued packets are discarded.
    Failed,
}

#[derive(Debug)]
struct FifoState {
    packets: VecDeque<Packet>,
    capacity: usize,
    state: InputState,
}

#[derive(Debug, Clone)]
pub struct PacketFifo {
    shared: Arc<(Mutex<FifoState>, Condvar)>,
}

impl Default for PacketFifo {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PacketFifo {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new((
                Mutex::new(FifoState {
                    packets: VecDeque::with_capacity(capacity),
                    capacity: capacity.max(1),
                    state: InputState::Running,
                }),
                Condvar::new(),
            )),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FifoState> {
        self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a packet, waiting while the queue is full.
    ///
    /// Fails once the queue has left the running state.
    pub fn push(&self, packet: Packet) -> Result<(), InputError> {
        let (_, cvar) = &*self.shared;
        let mut fifo = self.lock();

        while fifo.state == InputState::Running && fifo.packets.len() >= fifo.capacity {
            fifo = cvar.wait(fifo).unwrap_or_else(PoisonError::into_inner);
        }

        match fifo.state {
            InputState::Running => {
                fifo.packets.push_back(packet);
                cvar.notify_all();
                Ok(())
            }
            InputState::EndOfStream => Err(InputError::EndOfStream),
            InputState::Stopped => Err(InputError::Stopped),
            InputState::Failed => Err(InputError::Upstream),
        }
    }

    /// Takes the oldest packet, waiting while the queue is empty and running.
    pub fn pop(&self) -> Result<Packet, InputError> {
        let (_, cvar) = &*self.shared;
        let mut fifo = self.lock();

        loop {
            match fifo.state {
                InputState::Stopped => return Err(InputError::Stopped),
                InputState::Failed => return Err(InputError::Upstream),
                _ => {}
            }

            if let Some(packet) = fifo.packets.pop_front() {
                cvar.notify_all();
                return Ok(packet);
            }

            if fifo.state == InputState::EndOfStream {
                return Err(InputError::EndOfStream);
            }

            fifo = cvar.wait(fifo).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn end_of_stream(&self) {
        self.transition(InputState::EndOfStream);
    }

    pub fn stop(&self) {
        self.transition(InputState::Stopped);
    }

    pub fn fail(&self) {
        self.transition(InputState::Failed);
    }

    fn transition(&self, state: InputState) {
        let (_, cvar) = &*self.shared;
        let mut fifo = self.lock();

        // Stop and failure are terminal; end of stream only ends a running queue.
        match (fifo.state, state) {
            (InputState::Stopped | InputState::Failed, _) => return,
            (InputState::EndOfStream, InputState::EndOfStream) => return,
            _ => {}
        }

        fifo.state = state;
        if matches!(state, InputState::Stopped | InputState::Failed) {
            fifo.packets.clear();
        }
        cvar.notify_all();
    }

    pub fn state(&self) -> InputState {
        self.lock().state
    }

    pub fn len(&self) -> usize {
        self.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
