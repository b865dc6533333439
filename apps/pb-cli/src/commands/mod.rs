pub mod build;
pub mod capabilities;
pub mod version;
