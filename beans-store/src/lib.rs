pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod mailer;
pub mod memory;
pub mod order_repo;
pub mod snap;

pub use app_config::Config;
pub use catalog_repo::PgCatalogRepository;
pub use database::DbClient;
pub use mailer::MailRelayNotifier;
pub use order_repo::PgOrderRepository;
pub use snap::SnapGateway;
