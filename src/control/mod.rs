pub mod adequacy;
pub mod reflection;
pub mod termination;
