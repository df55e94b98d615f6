pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryIncidentStore;
pub use postgres::{migrate, PgIncidentStore};
pub use traits::IncidentStore;
