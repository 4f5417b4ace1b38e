//! Run WebAssembly and JavaScript guests and relay what they write to
//! stdout, one complete line at a time, onto an embedder-owned surface.

pub mod config;
pub mod error;
pub mod guest;
pub mod host;
pub mod js_engine;
pub mod relay;
pub mod server;
pub mod telemetry;
pub mod wasm_engine;

pub use error::AppError;
pub use host::{HandlerSlot, OutputHost, RunReport, WriteHandler};
pub use relay::{configure, OutputRelay, OutputSurface, RelayHandle, SharedSurface};
