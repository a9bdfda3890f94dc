//! Process-level collaborators: local shell, SSH sessions and file transfer

pub mod rsync;
pub mod shell;
pub mod ssh;
