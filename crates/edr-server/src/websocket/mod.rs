pub mod broker;

pub use broker::stream_broker;
