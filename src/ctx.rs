// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Muster context and initialization protocol
//!
//! The context is the process-wide owner of the engine capability and the
//! initialization lifecycle. Create it exactly once per process and pass it
//! by reference to everything that needs membership state.

use std::sync::{Arc, Mutex};

use log::debug;

use crate::engine::Engine;
use crate::error::{MusterError, MusterResult};
use crate::resolver::{self, CommSpec, ProcessSetsSpec};

/// Process-wide initialization state. Monotonic; never cycles back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    ShuttingDown,
}

/// The entry point to muster operations.
///
/// Owns the engine capability and the lifecycle state machine
/// (`Uninitialized -> Initialized -> ShuttingDown`). Dropping the context
/// performs the same idempotent release as [`MusterContext::shutdown`], so
/// engine resources are returned at normal process termination regardless of
/// caller discipline.
///
/// Concurrent `init`/`shutdown`/registry-mutation calls from multiple local
/// threads are not supported; at most one in-flight mutating call per process
/// at a time.
pub struct MusterContext {
    engine: Arc<dyn Engine>,
    state: Mutex<Lifecycle>,
}

impl MusterContext {
    /// Creates the context in the `Uninitialized` state. One context per
    /// process; creating more is a caller error this layer does not detect.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            state: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    pub(crate) fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Initializes the runtime: resolves the membership specification, applies
    /// the dynamic-mode switch, and runs the one-time collective handshake.
    ///
    /// This is a job-wide barrier with no timeout: every process that is a
    /// member of any communicator passed in must call it exactly once, and it
    /// returns only once all of them have. If a required participant never
    /// calls it, the remaining processes block indefinitely. That obligation
    /// lies with the caller; it is not enforced here.
    ///
    /// Fails with [`MusterError::Configuration`] when called on an already
    /// initialized or shut-down context, and with resolver errors
    /// ([`MusterError::Configuration`], [`MusterError::UnsupportedController`])
    /// before any engine call is made.
    pub fn init(&self, comm: CommSpec, process_sets: ProcessSetsSpec) -> MusterResult<()> {
        let mut state = self.state.lock().unwrap();
        match *state {
            Lifecycle::Uninitialized => {}
            Lifecycle::Initialized => {
                return Err(MusterError::configuration(
                    "muster is already initialized on this process",
                ))
            }
            Lifecycle::ShuttingDown => {
                return Err(MusterError::configuration(
                    "muster has been shut down on this process",
                ))
            }
        }

        let plan = resolver::resolve(self.engine.as_ref(), &comm, &process_sets)?;

        // The engine consults the switch during init, so it must be visible
        // before the handshake starts.
        if plan.dynamic {
            self.engine.set_dynamic_process_sets(true);
        }

        debug!(
            "entering initialization handshake ({} explicit ranks, {} initial process sets)",
            plan.global_ranks.len(),
            plan.set_sizes.len()
        );
        self.engine
            .init(&plan.global_ranks, &plan.set_ranks, &plan.set_sizes);

        *state = Lifecycle::Initialized;
        Ok(())
    }

    /// True once the engine reports the handshake complete.
    pub fn is_initialized(&self) -> bool {
        self.engine.is_initialized()
    }

    /// Releases engine resources. Valid from any state, a no-op once the
    /// context is already shutting down, and never fails. Also runs on drop.
    ///
    /// Must not be invoked concurrently with an in-flight query.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == Lifecycle::ShuttingDown {
            return;
        }
        debug!("shutting down muster context");
        self.engine.shutdown();
        *state = Lifecycle::ShuttingDown;
    }
}

impl Drop for MusterContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
