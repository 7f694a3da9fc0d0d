//! Record when tasks run, store it compactly and reduce it for display.
//!
//! Probes inside an application log a timestamp through an
//! [`Encoder`](codec::Encoder) every time a task activates and completes.
//! The [`recorder`] gathers these streams into tick files, the
//! [`Decoder`](codec::Decoder) reads them back and [`jitter`] together with
//! [`downsample`] turn them into something plottable.

pub mod codec;
pub mod downsample;
pub mod io;
pub mod jitter;
pub mod recorder;
pub mod time;

pub use codec::{Decoder, Encoder, Session, TickHeader};
pub use downsample::Point;
pub use recorder::{Recorder, RecorderConfig};
pub use time::Nanos;
