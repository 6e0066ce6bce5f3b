pub mod repository;
pub mod sqlite;

pub use repository::{KycRepository, PackageRepository, RiskParameterRepository};
pub use sqlite::SqliteDatabase;
