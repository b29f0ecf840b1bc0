//! Data-ready notifications for interrupt-driven readers

use std::time::SystemTime;

use parking_lot::Mutex;

use crate::channel::ScanKind;

/// Raised at the end of a cycle for one notification class
#[derive(Debug, Clone, PartialEq)]
pub struct DataReady {
    pub instance: String,
    pub kind: ScanKind,
    pub timestamp: SystemTime,
}

/// Subscribers of one notification class
///
/// Each subscriber has a bounded queue. A full queue already holds an
/// unread notification, so the new one is dropped; disconnected
/// subscribers are removed.
pub(crate) struct ScanList {
    subscribers: Mutex<Vec<flume::Sender<DataReady>>>,
    depth: usize,
}

impl ScanList {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            depth: depth.max(1),
        }
    }

    pub(crate) fn subscribe(&self) -> flume::Receiver<DataReady> {
        let (tx, rx) = flume::bounded(self.depth);
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn raise(&self, event: &DataReady) {
        self.subscribers
            .lock()
            .retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(flume::TrySendError::Full(_)) => {
                    log::trace!("{}: {:?} notification dropped", event.instance, event.kind);
                    true
                }
                Err(flume::TrySendError::Disconnected(_)) => false,
            });
    }
}

/// One list per notification class
pub(crate) struct Scans {
    value: ScanList,
    scale: ScanList,
    window: ScanList,
}

impl Scans {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            value: ScanList::new(depth),
            scale: ScanList::new(depth),
            window: ScanList::new(depth),
        }
    }

    pub(crate) fn get(&self, kind: ScanKind) -> &ScanList {
        match kind {
            ScanKind::Value => &self.value,
            ScanKind::Scale => &self.scale,
            ScanKind::Window => &self.window,
        }
    }
}
