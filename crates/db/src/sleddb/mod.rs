mod db;
mod init;
mod schema;

pub use db::SledWatcherDb;
pub use init::init_watcher_db;
