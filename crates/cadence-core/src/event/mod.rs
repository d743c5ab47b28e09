//! Event plumbing.
//!
//! - `EventBus` distributes lifecycle `WorkflowEvent`s to every subscriber.
//! - `EventSignals` carries named events fired through the event ingress so
//!   `wait` steps blocked on an event name can wake up.

pub mod bus;
pub mod signal;

pub use bus::EventBus;
pub use signal::{EventSignals, NamedEvent};
