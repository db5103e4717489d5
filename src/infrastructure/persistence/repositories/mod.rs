pub mod account_settings_repository;
pub mod decision_repository;
pub mod kline_repository;
pub mod order_repository;
pub mod position_repository;
pub mod snapshot_repository;
pub mod trade_repository;

pub use account_settings_repository::SqliteAccountSettingsRepository;
pub use decision_repository::SqliteDecisionRepository;
pub use kline_repository::SqliteKlineRepository;
pub use order_repository::SqliteOrderRepository;
pub use position_repository::SqlitePositionRepository;
pub use snapshot_repository::SqliteSnapshotRepository;
pub use trade_repository::SqliteTradeRepository;
