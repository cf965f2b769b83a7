pub mod delivery;
pub mod handlers;
pub mod range;
pub mod response;
pub mod upload;
