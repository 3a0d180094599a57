// # cfddns-core
//
// Core library for cfddns, a dynamic DNS updater that keeps one Cloudflare
// `A` record pointed at the host's current public IPv4 address.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for resolving the current public IP
// - **DnsProvider**: Trait for looking up and updating the managed record
// - **Reconciler**: One idempotent compare-and-update cycle
// - **Scheduler**: Runs the Reconciler at startup and then at a fixed interval
// - **ZoneCache**: Optional time-bounded cache of zone IDs
//
// ## Design Principles
//
// 1. **Live state wins**: the published IP is read from the provider every cycle
// 2. **Idempotency**: a cycle that finds no drift never writes
// 3. **Failure containment**: a failed cycle never stops the scheduler
// 4. **Explicit wiring**: collaborators are injected, there are no globals

pub mod cache;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod scheduler;
pub mod traits;

// Re-export core types for convenience
pub use config::Settings;
pub use error::{Error, Result};
pub use reconciler::{CycleResult, CycleStep, Reconciler};
pub use scheduler::{CycleReport, RunSummary, Scheduler};
pub use traits::{DnsProvider, IpSource};
