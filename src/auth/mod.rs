//! Session keeping for authenticated crawls
//!
//! # Components
//!
//! - `logout`: lexical check for links that would end the session
//! - `session`: the per-crawl session record and its transition table
//! - `detector`: decides whether a response means the session is gone
//! - `solver`: interface to the service that performs logins
//! - `coordinator`: serializes logins and holds/replays requests around them
//! - `gate`: the hooks the crawl loop calls

mod coordinator;
mod detector;
mod gate;
mod logout;
mod session;
mod solver;

pub use coordinator::{AuthResolution, AuthenticationCoordinator, LoginOutcome};
pub use detector::{LoginDetector, ResponseView};
pub use gate::{RequestGate, ResponseDecision};
pub use logout::{is_logout_token, looks_like_logout, LinkCandidate};
pub use session::{
    Admission, Credentials, Decision, FailureStep, LoginPage, SessionCookies, SessionSnapshot,
    SessionState, SessionTicket,
};
pub use solver::{HttpLoginSolver, LoginReply, LoginRequest, LoginSolver, NullSolver, SolverError};
