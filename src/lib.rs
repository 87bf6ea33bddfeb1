// library system: schema, data access and the integrity suite around it

pub mod clock;
pub mod config;
pub mod dao;
pub mod error;
pub mod fake;
pub mod harness;
pub mod sql;
pub mod types;

pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use config::Config;
pub use dao::{BookDao, BorrowingDao, Reference, ReferenceDao, UserDao};
pub use error::{DbError, Violation, ViolationKind};
pub use sql::{Table, DB};
