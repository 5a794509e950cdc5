// IaC generation workflow module
pub mod iac;

// Generator plumbing module
pub mod workflow_utils;
