//! Change feed consumption: event types, NDJSON tailing and routing

pub mod events;
pub mod router;
pub mod source;

pub use events::ChangeEvent;
pub use router::ChangeRouter;
pub use source::HttpChangeFeed;
