pub mod host;
pub mod process;
pub mod secrets;

pub use host::current_hostname;
pub use process::{CommandOutput, CommandRunner, SystemCommandRunner};
