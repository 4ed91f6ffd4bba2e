pub mod campaign;
pub mod contribution;
