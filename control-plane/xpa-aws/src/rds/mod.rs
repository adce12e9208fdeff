//! RDS kinds.

pub mod instance;
pub mod subnet_group;
