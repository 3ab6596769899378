pub mod pubsub;

pub use pubsub::*;
