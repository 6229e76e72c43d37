pub mod ids;
pub mod interview;
pub mod profile;
pub mod session;
