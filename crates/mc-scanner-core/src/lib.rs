pub mod config;
pub mod decompress;
pub mod encode;
pub mod engine;
pub mod error;
pub mod model;
pub mod nbt;
pub mod output;
pub mod policy;
pub mod progress;
pub mod scanner;
pub mod tables;

pub use config::{AppConfig, LoopMode};
pub use decompress::Decompressor;
pub use engine::{RunPhase, ScanEngine, ScanRequest, ScanRun};
pub use error::Error;
pub use model::{BlockState, ItemType, Location, Needle, NeedleSet, SearchResult};
pub use output::{OutputSink, OutputTarget};
pub use policy::{Bounds, ScanPolicy, SearchPolicy};
pub use progress::{ProgressReporter, SilentReporter, TaskProgress};
pub use tables::{BlockRegistry, StatsTable};
