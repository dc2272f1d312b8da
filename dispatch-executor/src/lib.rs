//! An asynchronous executor for a dedicated serial dispatch thread.
//!
//! This crate provides a [`DispatchQueue`], a FIFO of jobs that all run on one
//! dedicated OS thread, and an [`Executor`] that can be used to spawn and run
//! asynchronous tasks on that queue.
//!
//! It also provides a [`Handle`] type that allows for sending `!Send` values
//! between threads, as long as they are only accessed on the queue that owns them.
//!
//! # Example
//!
//! ```no_run
//! # use dispatch_executor::{Executor, QueueAttrBuilder};
//! let task = Executor::background("worker", QueueAttrBuilder::serial().build(), |executor| {
//!     executor.spawn(async {
//!         println!("Hello, world!");
//!         42
//!     })
//! })
//! .unwrap();
//!
//! assert_eq!(futures_lite::future::block_on(task), 42);
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, mpsc};
use std::task::{Context, Poll};
use std::thread::{self, ThreadId};

use async_task::{Runnable, spawn};
use tracing::{error, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A serial queue whose jobs run one at a time, in submission order, on a dedicated thread.
///
/// Cloning a `DispatchQueue` yields another handle to the same thread. The thread exits
/// after the last handle is dropped and the jobs already submitted have run.
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    label: String,
    sender: mpsc::Sender<Job>,
    thread: ThreadId,
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("label", &self.inner.label)
            .field("thread", &self.inner.thread)
            .finish()
    }
}

impl PartialEq for DispatchQueue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for DispatchQueue {}

impl std::hash::Hash for DispatchQueue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.thread.hash(state);
    }
}

impl DispatchQueue {
    /// Spawns the dispatch thread for a new queue.
    pub fn new(label: &str, attr: Option<&QueueAttr>) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();

        let mut builder = thread::Builder::new().name(label.to_owned());
        if let Some(stack_size) = attr.and_then(|attr| attr.stack_size) {
            builder = builder.stack_size(stack_size);
        }

        let thread_label = label.to_owned();
        let handle = builder.spawn(move || {
            trace!(queue = %thread_label, "dispatch thread started");
            while let Ok(job) = receiver.recv() {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    error!(
                        queue = %thread_label,
                        panic = panic_message(&*payload),
                        "dispatch job panicked"
                    );
                }
            }
            trace!(queue = %thread_label, "dispatch thread exiting");
        })?;

        Ok(Self {
            inner: Arc::new(QueueInner {
                label: label.to_owned(),
                sender,
                thread: handle.thread().id(),
            }),
        })
    }

    /// The label this queue was created with. It is also the name of the dispatch thread.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Returns `true` if the calling thread is this queue's dispatch thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread
    }

    /// Submits `work` to run on the dispatch thread and returns immediately.
    pub fn exec_async<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.inner.sender.send(Box::new(work)).is_err() {
            error!(queue = %self.inner.label, "dispatch thread is gone, job dropped");
        }
    }

    /// Runs `work` on the dispatch thread and blocks the calling thread until it returns.
    ///
    /// When called from the dispatch thread itself, `work` runs inline. A panic inside `work`
    /// is resumed on the calling thread.
    pub fn exec_sync<F, R>(&self, work: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.is_current() {
            return work();
        }

        let (sender, receiver) = mpsc::sync_channel(1);
        let job: Box<dyn FnOnce() + Send + '_> = Box::new(move || {
            let _ = sender.send(panic::catch_unwind(AssertUnwindSafe(work)));
        });
        // Safety: this function does not return before `job` has either run to completion or
        // been dropped unrun, so the borrows captured by `work` outlive every use of them.
        let job: Job = unsafe { std::mem::transmute::<Box<dyn FnOnce() + Send + '_>, Job>(job) };

        if let Err(mpsc::SendError(job)) = self.inner.sender.send(job) {
            drop(job);
        }

        match receiver.recv() {
            Ok(Ok(ret)) => ret,
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => panic!("dispatch queue `{}` terminated", self.inner.label),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "(non-string panic payload)"
    }
}

/// Attributes applied to the thread behind a [`DispatchQueue`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueAttr {
    stack_size: Option<usize>,
}

/// A builder for creating [`QueueAttr`] objects.
#[derive(Debug, Clone)]
pub struct QueueAttrBuilder {
    attr: Option<QueueAttr>,
}

impl QueueAttrBuilder {
    /// Creates a new builder for a serial dispatch queue.
    pub fn serial() -> Self {
        Self { attr: None }
    }

    /// Sets the stack size of the dispatch thread, in bytes.
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        let mut attr = self.attr.take().unwrap_or_default();
        attr.stack_size = Some(stack_size);
        self.attr = Some(attr);
        self
    }

    /// Builds the [`QueueAttr`] object.
    pub fn build(self) -> Option<QueueAttr> {
        self.attr
    }
}

/// An executor that runs async tasks on a [`DispatchQueue`].
#[derive(Clone)]
pub struct Executor {
    queue: DispatchQueue,
    phantom: PhantomData<*mut ()>,
}

impl Executor {
    /// Creates a new executor on a new dispatch queue and passes it to the provided entry point function.
    ///
    /// `entry` runs on the dispatch thread; this call blocks until it returns.
    pub fn background<F, R>(label: &str, queue_attributes: Option<QueueAttr>, entry: F) -> std::io::Result<R>
    where
        F: FnOnce(Self) -> R + Send,
        R: Send,
    {
        let queue = DispatchQueue::new(label, queue_attributes.as_ref())?;
        let executor_queue = queue.clone();
        Ok(queue.exec_sync(move || {
            entry(Self {
                queue: executor_queue,
                phantom: PhantomData,
            })
        }))
    }

    /// Create a [`Handle`] to a value that can be sent between threads.
    ///
    /// `Handle` ensures that all accesses to `value` through the handle are synchronized on this executor's dispatch queue.
    pub fn handle<T>(&self, value: T) -> Handle<T> {
        Handle {
            queue: self.queue.clone(),
            value,
        }
    }

    /// Spawns a new asynchronous task, returning a [`Task`] that can be used to await its result.
    ///
    /// Dropping the `Task` will cancel it. If you want the task to run independently, you must call [`detach()`][Task::detach]
    pub fn spawn<R>(&self, future: impl Future<Output = R> + Send + 'static) -> Task<R>
    where
        R: Send + 'static,
    {
        let queue = self.queue.clone();
        let (runnable, task) = spawn(future, move |runnable: Runnable| {
            queue.exec_async(|| {
                runnable.run();
            })
        });
        runnable.schedule();
        Task(task)
    }

    /// Returns a reference to the underlying [`DispatchQueue`].
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    /// Returns `true` if the calling thread is this executor's dispatch thread.
    pub fn is_current(&self) -> bool {
        self.queue.is_current()
    }
}

/// A marker trait for values whose `Drop` implementation is `Sync`.
///
/// These values can be moved across threads even if they are `!Send`
/// as long as they are only accessed from their native thread.
///
/// # Safety
///
/// It must be safe to drop values of this type from arbitrary threads.
pub unsafe trait SyncDrop {}

/// A handle to a value that is owned by a specific [`Executor`].
///
/// This allows for sending `!Send` values between threads, as long as they are only
/// accessed on the thread that owns them.
pub struct Handle<T> {
    queue: DispatchQueue,
    value: T,
}

unsafe impl<T: SyncDrop> Send for Handle<T> {}

unsafe impl<T: SyncDrop> Sync for Handle<T> {}

impl<T: std::fmt::Debug> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dispatch_executor::Handle { .. }")
    }
}

impl<T> Handle<T> {
    /// Acquires a lock on the value, running the provided function on the owning executor's dispatch queue.
    ///
    /// This method will block the current thread until the function returns. Called from the
    /// dispatch thread itself, the function runs inline.
    pub fn lock<R>(&self, func: impl FnOnce(&T, &Executor) -> R + Send) -> R
    where
        Self: Sync,
        R: Send,
    {
        self.queue.exec_sync(|| func(&self.value, &self.executor()))
    }

    /// Returns the queue this value is confined to.
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    fn executor(&self) -> Executor {
        Executor {
            queue: self.queue.clone(),
            phantom: PhantomData,
        }
    }
}

/// A future that resolves to the result of an asynchronous task.
///
/// Dropping a [`Task`] cancels it, which means its future won't be polled again. To drop the
/// [`Task`] handle without canceling it, use [`detach()`][`Task::detach()`] instead.
#[derive(Debug)]
pub struct Task<T>(async_task::Task<T>);

impl<T> Task<T> {
    /// Detaches the task, allowing it to run in the background.
    pub fn detach(self) {
        self.0.detach()
    }
}

impl<T> Future for Task<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}
