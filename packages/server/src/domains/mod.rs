// Business domains
pub mod newsletter;
