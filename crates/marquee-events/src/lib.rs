//! Upcoming event aggregation for marquee sites.
//!
//! Fetches each author's upcoming events from an external events service,
//! then groups, sorts and deduplicates them so one page can list who is
//! speaking at, attending or tracking what.

pub mod aggregate;
pub mod author;
pub mod source;

pub use aggregate::{aggregate, group_events, parse_period, AggregateError, Event, GroupedEvents};
pub use author::Author;
pub use source::{EventSource, HttpEventSource, RawEvent, SourceError};
