#![forbid(unsafe_code)]

pub mod display;
pub mod error;
pub mod expr;
pub mod irep;
pub mod location;
pub mod migrate;
pub mod pool;
pub mod types;

pub use error::IrepError;
pub use expr::{BinaryOp, Designator, Endianness, Expr, ExprKind, OpClass, UnaryOp, bv_range};
pub use irep::{ASSOCIATIVE_IDS, Irep, normalize};
pub use location::SourceLocation;
pub use migrate::{MigrateConfig, Migrator};
pub use pool::{IrepPool, PoolStats};
pub use types::{ArraySize, Member, StructType, Type, TypeKind};
