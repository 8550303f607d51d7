pub mod carrier;
pub mod session;
pub mod trip;
