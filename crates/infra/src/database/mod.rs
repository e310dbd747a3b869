//! Database implementations of the core storage ports

mod codec;

pub mod bucket_repository;
pub mod identity_repository;
pub mod latest_repository;
pub mod manager;
pub mod metric_type_repository;
pub mod series_reader;
pub mod tag_repository;
pub mod tag_search;

pub use bucket_repository::SqliteBucketRepository;
pub use identity_repository::SqliteIdentityRepository;
pub use latest_repository::SqliteLatestRepository;
pub use manager::DbManager;
pub use metric_type_repository::SqliteMetricTypeRepository;
pub use series_reader::SqliteSeriesReader;
pub use tag_repository::SqliteTagRepository;
pub use tag_search::SqliteTagSearchSource;
