//! Credential rotation across equivalent OAuth accounts
//!
//! Keeps outbound calls flowing by switching away from an account that is
//! rate limited or cooling down, and persists every switch so a restart does
//! not walk straight back into a throttled account.
//!
//! Account lifecycle:
//! 1. Manager starts from the stored document, or seeds one account from a
//!    fallback credential, or starts empty
//! 2. Caller asks for `current_or_next()` before each outbound call
//! 3. Upstream 429 → `record_rate_limit` until the reset time
//! 4. Upstream 401/403 or a network failure → `record_cooldown`
//! 5. Windows expire on their own: availability is recomputed from
//!    timestamps on every check
//! 6. When nothing is available, `min_wait_time()` says how long to back off

pub mod clock;
pub mod credential;
pub mod error;
pub mod manager;
pub mod outcome;
pub mod persist;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::FallbackCredential;
pub use error::{Error, Result};
pub use manager::{AccountStatus, RotationConfig, RotationManager};
pub use outcome::{Outcome, classify_status, parse_retry_after};
pub use persist::Persistence;
