pub mod session;

pub use session::{Player, PollSnapshot, Session};
