pub mod capability;
pub mod jwt;
