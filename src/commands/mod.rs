// ABOUTME: Command module aggregator for the rolltrack CLI.
// ABOUTME: Re-exports single-resource and multitrack command handlers.

mod feedback;
mod multitrack;
mod track;

pub use feedback::Policy;
pub use multitrack::multitrack;
pub use track::track_one;
