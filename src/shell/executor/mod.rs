#[allow(clippy::module_inception)]
mod executor;
mod job_manager;

pub use executor::{open_redirection, ExecOutcome, Executor};
pub use job_manager::{waitpidx, BackgroundJob, JobManager, JobStatus};
