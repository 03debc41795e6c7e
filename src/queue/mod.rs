// In-memory job queue: submit, background worker, poll, reap

pub mod jobs;
pub mod store;
pub mod worker;

pub use jobs::{DocType, Job, JobKind, JobPatch, JobStatus, ScanSource, ScanType};
pub use store::JobStore;
pub use worker::{reap, submit, JobTicket};
