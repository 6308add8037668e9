pub mod config;
pub mod controller;
pub mod error;
pub mod events;
mod frame_loop;
pub mod state;

pub use config::SessionConfig;
pub use controller::{start_session, CompletionCallback, PoseFeed, SessionHandle};
pub use error::SessionError;
pub use events::{FinishReason, SessionEvent, SessionOutcome, SessionPhase, SessionSnapshot};
pub use state::{ClockTick, SessionMachine, SessionState};
