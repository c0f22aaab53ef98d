//! Rate limiting logic and state management.

mod clock;
mod decision;
mod key;
mod limiter;
mod sweeper;

pub use clock::{Clock, DayBoundary, ManualClock, SystemClock};
pub use decision::{Decision, Outcome};
pub use key::CounterKey;
pub use limiter::{RateLimiter, DEFAULT_DAILY_LIMIT};
pub use sweeper::spawn_sweeper;
