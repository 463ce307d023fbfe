//! Job sequencing over both device channels.
//!
//! A print runs `Idle -> SessionOpening -> Uploading -> AwaitingCompletion
//! -> Closing -> Done`; any failure on the way goes through `Aborting`,
//! which sends print-stop and closes the data stream before the error is
//! returned.

mod cancel;
mod sequencer;

pub use cancel::CancelToken;
pub use sequencer::{JobKind, JobOptions, JobReport, JobSequencer, Phase};
