pub mod candidate;
pub mod hr_user;
pub mod requirement;
pub mod status;
pub mod submission;
