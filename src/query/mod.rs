//! Statements and expressions
//!
//! Statements are assembled with builders and executed through
//! `Transaction::exec`:
//!
//! ```ignore
//! use aerodoc::query::{expr, SelectStmt};
//!
//! let stmt = SelectStmt::new("users")
//!     .where_expr(expr::gt(expr::field("age")?, expr::lit(18i64)));
//! let adults = db.view(|tx| tx.exec(&stmt, &[])?.into_stream().into_documents())?;
//! ```
//!
//! # Evaluation Rules
//!
//! - Comparisons involving an absent field are false, never an error
//! - Integer arithmetic is checked; overflow is an error
//! - Division or modulo by zero yields NULL
//! - LIMIT and OFFSET are evaluated once, before the table is touched

mod delete;
pub mod expr;
mod insert;
mod projection;
mod select;
mod stack;
mod statement;
mod update;

pub use delete::DeleteStmt;
pub use expr::{BoxExpr, Expr};
pub use insert::InsertStmt;
pub use projection::{DocumentMask, ResultField, KEY_COLUMN};
pub use select::SelectStmt;
pub use stack::{EvalStack, Param};
pub use statement::{Statement, StatementResult};
pub use update::UpdateStmt;
