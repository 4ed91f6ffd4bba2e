pub mod campaign;
pub mod contribution;
pub mod session;
