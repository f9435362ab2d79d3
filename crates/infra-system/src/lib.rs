// OS-facing infrastructure for QueueCTL

mod process_control;
mod shell_executor;

pub use process_control::SystemProcessControl;
pub use shell_executor::ShellExecutor;
