extern crate serde;
extern crate serde_json;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate tracing;
extern crate tracing_subscriber;

pub mod abstract_server;
pub mod file_format;
pub mod hierarchy;
pub mod logging;
pub mod server;
