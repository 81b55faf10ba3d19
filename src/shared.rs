//! Shared state between the yaw integration thread and the foreground
//! mission loop.
//!
//! Cumulative yaw has a single writer (the integration thread) and two
//! readers (the primitive loops and the foreground poll), so a word-sized
//! atomic is sufficient; no lock is taken on the hot path.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Atomic wrapper for f32 values.
/// Uses AtomicU32 with bit reinterpretation.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(val: f32) -> Self {
        Self(AtomicU32::new(val.to_bits()))
    }

    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.0.load(order))
    }

    pub fn store(&self, val: f32, order: Ordering) {
        self.0.store(val.to_bits(), order);
    }
}

/// State shared between the yaw thread and the mission foreground.
#[derive(Debug)]
pub struct MotionState {
    /// Accumulated yaw in degrees since the last reset.
    /// Written only by the yaw integration thread.
    yaw_degrees: AtomicF32,

    /// Bumped by every reset so the integration thread can discard an
    /// accumulation that predates the reset instead of republishing it.
    yaw_epoch: AtomicU32,

    /// Latched sensor fault. Once set, the running primitive disables the
    /// motors and aborts the mission.
    fault: AtomicBool,

    /// Fault description, set together with the fault flag.
    fault_reason: RwLock<Option<String>>,

    /// Cancellation token. Set by Ctrl-C, the abort switch, or shutdown.
    cancelled: AtomicBool,

    /// Tells the yaw thread to exit at the end of a mission.
    yaw_thread_stop: AtomicBool,
}

impl MotionState {
    pub fn new() -> Self {
        Self {
            yaw_degrees: AtomicF32::new(0.0),
            yaw_epoch: AtomicU32::new(0),
            fault: AtomicBool::new(false),
            fault_reason: RwLock::new(None),
            cancelled: AtomicBool::new(false),
            yaw_thread_stop: AtomicBool::new(false),
        }
    }

    /// Current accumulated yaw in degrees.
    pub fn yaw(&self) -> f32 {
        self.yaw_degrees.load(Ordering::Acquire)
    }

    /// Store accumulated yaw. Called only by the integration thread
    /// (and by tests driving the state directly).
    pub fn set_yaw(&self, degrees: f32) {
        self.yaw_degrees.store(degrees, Ordering::Release);
    }

    /// Zero the yaw accumulator at the start of a primitive.
    pub fn reset_yaw(&self) {
        self.yaw_epoch.fetch_add(1, Ordering::AcqRel);
        self.yaw_degrees.store(0.0, Ordering::Release);
    }

    /// Current reset epoch of the yaw accumulator.
    pub fn yaw_epoch(&self) -> u32 {
        self.yaw_epoch.load(Ordering::Acquire)
    }

    /// Latch a sensor fault with a reason.
    pub fn trigger_fault(&self, reason: String) {
        if let Ok(mut guard) = self.fault_reason.write() {
            *guard = Some(reason);
        }
        self.fault.store(true, Ordering::Release);
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }

    pub fn fault_reason(&self) -> Option<String> {
        self.fault_reason.read().ok().and_then(|g| g.clone())
    }

    /// Request cancellation of the running mission.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Signal the yaw thread to exit.
    pub fn stop_yaw_thread(&self) {
        self.yaw_thread_stop.store(true, Ordering::Release);
    }

    pub fn yaw_thread_should_stop(&self) -> bool {
        self.yaw_thread_stop.load(Ordering::Acquire)
    }
}

impl Default for MotionState {
    fn default() -> Self {
        Self::new()
    }
}
