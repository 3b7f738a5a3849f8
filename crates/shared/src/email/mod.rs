pub mod gmail;
pub mod historic;
pub mod triage;

pub use gmail::{FetchedEmail, GmailClient, GmailError};
pub use historic::{HistoricOutcome, run_historic_analysis};
pub use triage::{TriageEngine, TriageReport, TriageStats};
