pub mod auth;
pub mod intake;
pub mod responses;
pub mod router;
pub mod state;
pub mod subnum;
pub mod upload;

pub use state::AppState;
