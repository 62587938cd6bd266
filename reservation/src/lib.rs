pub mod clock;
pub mod coordinator;
pub mod eligibility;
pub mod error;
pub mod locks;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use coordinator::ReservationCoordinator;
pub use eligibility::{Eligibility, check_eligibility};
pub use error::ReservationError;
pub use types::{CoordinatorConfig, Preview, ReservationReceipt};
