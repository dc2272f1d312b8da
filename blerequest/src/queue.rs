use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dispatch_executor::{Executor, Handle, SyncDrop};
use tracing::{debug, error, trace};

use crate::device::Device;
use crate::dispatch::QueueConfig;
use crate::execution::{Dispatcher, Execution};
use crate::status::Status;

/// A FIFO [`Dispatcher`] that executes one request at a time on its own dispatch thread.
///
/// The queue owns the [`Device`]; it is only ever touched on the dispatch thread. Outcomes are
/// delivered there too, after which the next request starts.
///
/// ```no_run
/// # use blerequest::{Data, Device, QueueConfig, Request, RequestQueue};
/// # fn example(device: impl Device + 'static, characteristic: blerequest::Characteristic) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = RequestQueue::new(device, QueueConfig::default())?;
/// Request::connect().attach(queue.dispatcher()).enqueue()?;
/// let battery: Data = Request::read(characteristic)
///     .attach(queue.dispatcher())
///     .wait_timeout(std::time::Duration::from_secs(5))?;
/// # Ok(())
/// # }
/// ```
pub struct RequestQueue<D: Device + 'static> {
    inner: Arc<QueueInner<D>>,
}

impl<D: Device + 'static> Clone for RequestQueue<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Device + 'static> std::fmt::Debug for RequestQueue<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("queue", self.inner.device.queue())
            .field("pending", &self.len())
            .finish()
    }
}

struct QueueInner<D> {
    device: Handle<DeviceCell<D>>,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    executions: VecDeque<Execution>,
    busy: bool,
}

struct DeviceCell<D>(RefCell<D>);

// Safety: `D: Send`, and the `RefCell` is only borrowed through `Handle::lock`, which runs on
// the dispatch thread.
unsafe impl<D: Send> SyncDrop for DeviceCell<D> {}

impl<D: Device + 'static> RequestQueue<D> {
    /// Spawns the dispatch thread and moves `device` onto it.
    pub fn new(device: D, config: QueueConfig) -> std::io::Result<Self> {
        let device = Executor::background(config.label(), config.to_attr(), move |executor| {
            executor.handle(DeviceCell(RefCell::new(device)))
        })?;
        debug!(queue = config.label(), "request queue started");

        Ok(Self {
            inner: Arc::new(QueueInner {
                device,
                state: Mutex::new(QueueState::default()),
            }),
        })
    }

    /// This queue as a shared [`Dispatcher`], for [`Request::attach()`][crate::Request::attach].
    pub fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        Arc::new(self.clone())
    }

    /// The number of executions waiting to run, not counting the one in flight.
    pub fn len(&self) -> usize {
        self.state().executions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fails every execution that has not started yet with [`Status::CANCELLED`].
    ///
    /// The executions are removed immediately; their failures are delivered on the dispatch
    /// thread.
    pub fn cancel_queue(&self) {
        let cancelled = std::mem::take(&mut self.state().executions);
        if cancelled.is_empty() {
            return;
        }
        debug!(count = cancelled.len(), "cancelling queued requests");
        self.inner.device.queue().exec_async(move || {
            for execution in cancelled {
                execution.notify_failure(Status::CANCELLED);
            }
        });
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self) {
        loop {
            let execution = {
                let mut state = self.state();
                match state.executions.pop_front() {
                    Some(execution) => execution,
                    None => {
                        state.busy = false;
                        return;
                    }
                }
            };
            let request = execution.request().id();
            if panic::catch_unwind(AssertUnwindSafe(|| self.run(execution))).is_err() {
                error!(request, "request callback panicked, continuing with the next request");
            }
        }
    }

    fn run(&self, execution: Execution) {
        if !execution.is_valid() {
            debug!(request = execution.request().id(), kind = ?execution.kind(), "invalid request");
            execution.notify_invalid();
            return;
        }

        trace!(request = execution.request().id(), kind = ?execution.kind(), "executing");
        let result = self.inner.device.lock(|device, _| {
            let mut device = device.0.borrow_mut();
            execution.perform(&mut *device)
        });
        execution.complete(result);
    }
}

impl<D: Device + 'static> Dispatcher for RequestQueue<D> {
    fn submit(&self, execution: Execution) {
        let start = {
            let mut state = self.state();
            state.executions.push_back(execution);
            !std::mem::replace(&mut state.busy, true)
        };
        if start {
            let queue = self.clone();
            self.inner.device.queue().exec_async(move || queue.drain());
        }
    }

    fn is_dispatch_thread(&self) -> bool {
        self.inner.device.queue().is_current()
    }
}
