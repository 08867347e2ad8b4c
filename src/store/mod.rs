pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use postgres::PostgresReportStore;
pub use sqlite::SqliteReportStore;
pub use trait_def::ReportStore;
