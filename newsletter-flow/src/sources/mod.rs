pub mod event_file;
pub mod http_event;

pub use event_file::EventFileSource;
pub use http_event::HttpEventSource;
