//! Command engine: decoding, handler registry, pending operations and the
//! dispatch loop shared by every device family.

pub mod command;
pub mod dispatch;
pub mod handler;
pub mod pending;
pub mod registry;

pub use command::{parse_timeout, Arguments, Command};
pub use dispatch::Dispatcher;
pub use handler::{decode_args, EffectHandler, Outcome};
pub use pending::{PendingOperation, PendingTable, TargetKey};
pub use registry::{Registry, RegistryBuilder, CLEAR_COMMAND};
