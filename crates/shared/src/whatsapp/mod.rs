pub mod brain;
pub mod transcribe;

pub use brain::{ChatOutcome, run_brain_pass};
pub use transcribe::{HttpTranscriber, Transcriber, queue_transcription};
