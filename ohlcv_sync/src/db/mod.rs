//! SQLite connection helpers.
//!
//! [`connection::connect_sqlite`] opens a connection and applies the PRAGMAs
//! every store call relies on: WAL journaling and a 5000ms busy_timeout.
//!
//! Example:
//! ```no_run
//! use ohlcv_sync::db::connection;
//!
//! let db_path = std::env::temp_dir().join("ohlcv_example.db");
//! let _conn = connection::connect_sqlite(db_path.to_str().unwrap()).expect("connect");
//! ```

pub mod connection;
