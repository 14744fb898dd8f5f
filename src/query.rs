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

//! Global queries and feature probes
//!
//! The scalar queries translate the engine's -1 sentinel into
//! [`MusterError::NotInitialized`]. Feature probes are well-defined at any
//! time, including before initialization, and never fail.

use crate::ctx::MusterContext;
use crate::error::{MusterError, MusterResult};

fn not_init_on_negative(value: i32) -> MusterResult<i32> {
    if value == crate::engine::SENTINEL_NOT_INITIALIZED {
        Err(MusterError::NotInitialized)
    } else {
        Ok(value)
    }
}

impl MusterContext {
    /// Number of worker processes in the job.
    pub fn size(&self) -> MusterResult<i32> {
        not_init_on_negative(self.engine().size())
    }

    /// Number of worker processes on the node this process runs on.
    pub fn local_size(&self) -> MusterResult<i32> {
        not_init_on_negative(self.engine().local_size())
    }

    /// Number of nodes carrying a worker with this process's local rank.
    pub fn cross_size(&self) -> MusterResult<i32> {
        not_init_on_negative(self.engine().cross_size())
    }

    /// Global rank of the calling process.
    pub fn rank(&self) -> MusterResult<i32> {
        not_init_on_negative(self.engine().rank())
    }

    /// Rank of the calling process within its node.
    pub fn local_rank(&self) -> MusterResult<i32> {
        not_init_on_negative(self.engine().local_rank())
    }

    /// Rank of the calling process's node among the nodes carrying a worker
    /// with the same local rank.
    pub fn cross_rank(&self) -> MusterResult<i32> {
        not_init_on_negative(self.engine().cross_rank())
    }

    /// Whether every node in the job runs the same number of workers.
    ///
    /// Well-defined only after initialization; before that the engine reports
    /// a default value rather than failing, and callers should not rely on
    /// it.
    pub fn is_homogeneous(&self) -> bool {
        self.engine().is_homogeneous()
    }

    /// Whether the controller supports multi-threaded use, so callers may mix
    /// this runtime with other users of the host communication library.
    pub fn mpi_threads_supported(&self) -> MusterResult<bool> {
        if !self.engine().mpi_enabled() {
            return Err(MusterError::unsupported_controller(
                "the MPI controller is not enabled",
            ));
        }
        not_init_on_negative(self.engine().mpi_threads_supported()).map(|v| v != 0)
    }

    // Feature probes.

    pub fn mpi_enabled(&self) -> bool {
        self.engine().mpi_enabled()
    }

    pub fn mpi_built(&self) -> bool {
        self.engine().mpi_built()
    }

    pub fn gloo_enabled(&self) -> bool {
        self.engine().gloo_enabled()
    }

    pub fn gloo_built(&self) -> bool {
        self.engine().gloo_built()
    }

    /// NCCL version code the engine was built with, 0 when not built.
    pub fn nccl_built(&self) -> i32 {
        self.engine().nccl_built()
    }

    pub fn cuda_built(&self) -> bool {
        self.engine().cuda_built()
    }

    pub fn rocm_built(&self) -> bool {
        self.engine().rocm_built()
    }
}
