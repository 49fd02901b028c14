pub mod install;
pub mod instance;
pub mod launch;
pub mod versions;
