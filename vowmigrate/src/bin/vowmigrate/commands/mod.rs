pub mod init;
pub mod migrate;
