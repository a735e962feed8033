pub mod angle;
pub mod buffer;
pub mod constants;
pub mod correlation;
pub mod frame_adapter;
pub mod peak;
pub mod processor;
pub mod report;

pub use angle::{AngleEstimate, Geometry};
pub use buffer::{CorrelationResult, SampleBuffer};
pub use correlation::{BackendKind, CorrelationEngine, CorrelationMode};
pub use frame_adapter::{ByteQueue, ByteSource, DecodeStatus, Frame, FrameDecoder};
pub use peak::{Peak, PeakLocator, PeakSearch};
pub use processor::{BearingProcessor, CycleReport, PipelineSettings};
