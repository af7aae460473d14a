pub mod app;

pub use app::{Application, HealthReport};
