//! Dedicated physics worker thread.
//!
//! [`PhysicsThread`] runs the [`PhysicsSystem`] at a fixed 60 Hz cadence on
//! its own thread. The registry and system live behind one shared mutex
//! ([`SimState`]); the worker takes it for the span of a step and releases it
//! before pacing, so the main thread contends only with the step itself.
//!
//! With double buffering on (the default), each step also snapshots the live
//! poses into a [`TransformBuffer`] while the lock is still held. The main
//! thread then calls [`swap_transform_buffers`](PhysicsThread::swap_transform_buffers)
//! followed by [`apply_transforms_to_registry`](PhysicsThread::apply_transforms_to_registry)
//! once per frame -- in that order, and never from the physics thread.
//! With buffering off, the main thread falls back to
//! [`with_lock`](PhysicsThread::with_lock) for any registry access.
//!
//! Lifecycle: Stopped -> Running -> Paused <-> Running -> Stopped. Pausing
//! parks the worker on a condition variable; `stop()` wakes it so the stop
//! flag is observed, then joins. A panic inside one step is caught, handed
//! to the registered handler, and the loop carries on -- one bad step must
//! not take the simulation thread down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace, warn};

use loam_ecs::registry::Registry;

use crate::components::Transform;
use crate::physics::buffer::TransformBuffer;
use crate::physics::components::RigidBody;
use crate::physics::system::{PhysicsSystem, FIXED_TIMESTEP};

/// EMA weight for the step-time statistic.
const STEP_TIME_SMOOTHING: f32 = 0.1;

/// Handler invoked with the panic message when a step panics.
type PanicHandler = Box<dyn Fn(&str) + Send>;

// ---------------------------------------------------------------------------
// SimState
// ---------------------------------------------------------------------------

/// The shared simulation state both threads touch, guarded by one mutex.
pub struct SimState {
    pub registry: Registry,
    pub system: PhysicsSystem,
}

// ---------------------------------------------------------------------------
// Control block
// ---------------------------------------------------------------------------

struct Control {
    running: AtomicBool,
    paused: AtomicBool,
    double_buffered: AtomicBool,
    pause_lock: Mutex<()>,
    pause_signal: Condvar,
    step_count: AtomicU64,
    /// Smoothed step time in milliseconds, stored as f32 bits.
    avg_step_ms_bits: AtomicU32,
    panic_handler: Mutex<Option<PanicHandler>>,
}

impl Control {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            double_buffered: AtomicBool::new(true),
            pause_lock: Mutex::new(()),
            pause_signal: Condvar::new(),
            step_count: AtomicU64::new(0),
            avg_step_ms_bits: AtomicU32::new(0),
            panic_handler: Mutex::new(None),
        }
    }
}

// ---------------------------------------------------------------------------
// PhysicsThread
// ---------------------------------------------------------------------------

/// Owner of the physics worker and the shared simulation state.
pub struct PhysicsThread {
    state: Arc<Mutex<SimState>>,
    buffer: Arc<TransformBuffer>,
    control: Arc<Control>,
    worker: Option<JoinHandle<()>>,
}

impl PhysicsThread {
    /// Wrap a system and registry for threaded driving. The thread is not
    /// started; call [`start`](Self::start).
    pub fn new(system: PhysicsSystem, registry: Registry) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState { registry, system })),
            buffer: Arc::new(TransformBuffer::new()),
            control: Arc::new(Control::new()),
            worker: None,
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Start the worker. Returns `false` (and changes nothing) if it is
    /// already running.
    pub fn start(&mut self) -> bool {
        if self.control.running.load(Ordering::Acquire) {
            warn!("physics thread already running");
            return false;
        }

        self.control.running.store(true, Ordering::Release);
        self.control.paused.store(false, Ordering::Release);
        self.control.step_count.store(0, Ordering::Relaxed);
        self.control.avg_step_ms_bits.store(0, Ordering::Relaxed);

        let control = Arc::clone(&self.control);
        let state = Arc::clone(&self.state);
        let buffer = Arc::clone(&self.buffer);
        self.worker = Some(
            thread::Builder::new()
                .name("physics".to_owned())
                .spawn(move || worker_loop(control, state, buffer))
                .expect("failed to spawn physics thread"),
        );

        info!(hz = (1.0 / FIXED_TIMESTEP) as u32, "physics thread started");
        true
    }

    /// Stop the worker and join it. Wakes a paused worker first so the stop
    /// flag is observed. Idempotent; safe on a never-started thread.
    pub fn stop(&mut self) {
        if !self.control.running.load(Ordering::Acquire) && self.worker.is_none() {
            return;
        }

        info!("physics thread stopping");
        self.control.running.store(false, Ordering::Release);
        {
            let _guard = self.control.pause_lock.lock();
            self.control.paused.store(false, Ordering::Release);
        }
        self.control.pause_signal.notify_all();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        info!(
            steps = self.control.step_count.load(Ordering::Relaxed),
            "physics thread stopped"
        );
    }

    /// Park the worker after its current iteration.
    pub fn pause(&self) {
        self.control.paused.store(true, Ordering::Release);
        debug!("physics thread paused");
    }

    /// Wake a paused worker.
    pub fn resume(&self) {
        {
            let _guard = self.control.pause_lock.lock();
            self.control.paused.store(false, Ordering::Release);
        }
        self.control.pause_signal.notify_all();
        debug!("physics thread resumed");
    }

    /// Whether the worker is running (possibly paused).
    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::Acquire)
    }

    /// Whether the worker is paused.
    pub fn is_paused(&self) -> bool {
        self.control.paused.load(Ordering::Acquire)
    }

    // -- main-thread surface ------------------------------------------------

    /// Flip the transform buffers. Main thread only, once per frame, before
    /// [`apply_transforms_to_registry`](Self::apply_transforms_to_registry).
    pub fn swap_transform_buffers(&self) {
        self.buffer.swap_buffers();
    }

    /// Apply the freshly swapped poses to the registry. Main thread only.
    pub fn apply_transforms_to_registry(&self) {
        let mut sim = self.state.lock();
        self.buffer.apply_to_registry(&mut sim.registry);
    }

    /// Run `f` with the shared state locked. This is how the main thread
    /// touches the registry while the worker may be mid-step.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut sim = self.state.lock();
        f(&mut sim)
    }

    /// The shared-state mutex itself, for callers that need to hold it
    /// across a wider span than [`with_lock`](Self::with_lock).
    pub fn shared(&self) -> Arc<Mutex<SimState>> {
        Arc::clone(&self.state)
    }

    /// The transform double-buffer.
    pub fn buffer(&self) -> &TransformBuffer {
        &self.buffer
    }

    // -- knobs and stats ----------------------------------------------------

    /// Toggle the double-buffered transform handoff.
    pub fn set_double_buffering(&self, enabled: bool) {
        self.control.double_buffered.store(enabled, Ordering::Release);
    }

    /// Whether double buffering is on.
    pub fn double_buffering(&self) -> bool {
        self.control.double_buffered.load(Ordering::Acquire)
    }

    /// Install the handler called when a step panics.
    pub fn set_panic_handler(&self, handler: impl Fn(&str) + Send + 'static) {
        *self.control.panic_handler.lock() = Some(Box::new(handler));
    }

    /// Steps executed since the last start.
    pub fn step_count(&self) -> u64 {
        self.control.step_count.load(Ordering::Relaxed)
    }

    /// Smoothed (EMA) step time in milliseconds.
    pub fn average_step_time_ms(&self) -> f32 {
        f32::from_bits(self.control.avg_step_ms_bits.load(Ordering::Relaxed))
    }
}

impl Drop for PhysicsThread {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Worker loop
// ---------------------------------------------------------------------------

fn worker_loop(control: Arc<Control>, state: Arc<Mutex<SimState>>, buffer: Arc<TransformBuffer>) {
    debug!("entering physics loop");
    let period = Duration::from_secs_f64(FIXED_TIMESTEP as f64);
    let mut smoothed_ms = 0.0f32;

    while control.running.load(Ordering::Acquire) {
        if control.paused.load(Ordering::Acquire) {
            let mut guard = control.pause_lock.lock();
            control.pause_signal.wait_while(&mut guard, |_| {
                control.paused.load(Ordering::Acquire) && control.running.load(Ordering::Acquire)
            });
            drop(guard);
            // Woken for shutdown rather than resume.
            if !control.running.load(Ordering::Acquire) {
                break;
            }
        }

        let step_start = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut sim = state.lock();
            let sim = &mut *sim;
            sim.system.update(&mut sim.registry, FIXED_TIMESTEP);

            for entity in sim.system.take_destroyed() {
                buffer.remove_entity(entity);
            }
            if control.double_buffered.load(Ordering::Acquire) {
                write_live_transforms(&sim.registry, &buffer);
            }
        }));
        // The mutex is released on unwind as well; contain the panic and keep
        // the loop alive.
        if let Err(payload) = outcome {
            let message = panic_message(payload);
            error!(error = %message, "physics step panicked");
            if let Some(handler) = control.panic_handler.lock().as_ref() {
                handler(&message);
            }
        }

        control.step_count.fetch_add(1, Ordering::Relaxed);

        let elapsed = step_start.elapsed();
        let step_ms = elapsed.as_secs_f32() * 1000.0;
        smoothed_ms = smoothed_ms * (1.0 - STEP_TIME_SMOOTHING) + step_ms * STEP_TIME_SMOOTHING;
        control
            .avg_step_ms_bits
            .store(smoothed_ms.to_bits(), Ordering::Relaxed);

        if elapsed < period {
            thread::sleep(period - elapsed);
        } else {
            trace!(
                step_ms,
                target_ms = FIXED_TIMESTEP * 1000.0,
                "physics step overran its budget"
            );
        }
    }
    debug!("exiting physics loop");
}

/// Snapshot every live, non-static body's pose into the write buffer.
fn write_live_transforms(registry: &Registry, buffer: &TransformBuffer) {
    for (entity, rigidbody) in registry.iter::<RigidBody>() {
        if rigidbody.is_static() || !rigidbody.has_body() {
            continue;
        }
        if let Some(transform) = registry.get::<Transform>(entity) {
            buffer.write_transform(entity, transform.x, transform.y, transform.rotation);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
