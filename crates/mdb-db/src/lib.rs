//! Mdb-DB: Database schema, migrations, and query operations
//!
//! This crate is the archive store. It uses SQLite through rusqlite with r2d2
//! connection pooling; every function takes a plain `&Connection`, so the same
//! queries run inside a [`tx::in_transaction`] scope or outside of one.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `tx` - Scoped transactions that roll back on error or panic
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use mdb_db::pool::{init_pool, get_conn};
//! use mdb_db::queries::files;
//!
//! let pool = init_pool("/var/lib/mdb/mdb.sqlite", 4).unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let file = files::find_by_sha1(&conn, "0123456789abcdef0123456789abcdef01234567").unwrap();
//! println!("Found: {:?}", file.map(|f| f.uid));
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod tx;
