//! Database-agnostic building blocks: identifier quoting, captured row
//! values and the statement execution trait.

pub mod identifier;
pub mod traits;
pub mod value;

pub use identifier::{quote_mysql, quote_mysql_list, validate_identifier};
pub use traits::SqlExecutor;
pub use value::{CellValue, RowBatch};
