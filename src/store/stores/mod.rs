//! Store backends.

pub mod json_file;
#[cfg(feature = "isqlite")]
pub mod sqlite;
pub mod table;
pub mod tmp;
