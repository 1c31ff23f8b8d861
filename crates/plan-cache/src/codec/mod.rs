pub mod embed;
pub mod features;
