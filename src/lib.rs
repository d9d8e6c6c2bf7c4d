//! # tilespawn
//!
//! Supervises external gdal2tiles tiling workers: spawns the worker process,
//! infers coarse progress from its raw stdout, enforces an exit-wait timeout,
//! reports completion through callbacks, and guarantees the child is never
//! left orphaned, including when the supervisor itself receives SIGINT or
//! SIGTERM.
//!
//! ## Usage
//!
//! ```bash
//! tilespawn -j layer-7 -i field.tif -p mercator -z 15-22 -a 0,0,0 -t 1800
//! ```
//!
//! ## Modules
//!
//! - `error` - Pre-spawn error kinds; everything post-spawn is absorbed into outcomes
//! - `job` - Job parameters, projection profile, zoom range, worker argument grammar
//! - `progress` - Two-slope percentage curve driven by output ticks
//! - `scanner` - Cancellable byte-at-a-time stdout drain and tick classification
//! - `registry` - Shared pid-keyed registry of running jobs for status surfaces
//! - `signal` - SIGINT/SIGTERM bridge cancelling active jobs' tokens
//! - `supervisor` - One job end-to-end: spawn, stream, bounded wait, cleanup

pub mod error;
pub mod job;
pub mod progress;
pub mod registry;
pub mod scanner;
pub mod signal;
pub mod supervisor;
