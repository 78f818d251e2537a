//! App - アプリケーション層
//!
//! queue / pool / broker を一つの `Courier` にまとめて起動する。

pub mod builder;

pub use self::builder::{BuildError, Courier, CourierBuilder};
