pub mod atmosphere;
pub mod trajectory;
