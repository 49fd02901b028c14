pub mod account;
pub mod config;
pub mod error;
pub mod instances;
pub mod launcher;
pub mod models;
pub mod net;
pub mod paths;
pub mod platform;

pub use account::{Account, AccountKind, AuthError, OfflineAccount};
pub use config::{LauncherConfig, LauncherContext};
pub use error::{LauncherError, LauncherResult};
pub use instances::InstanceRegistry;
pub use launcher::{InstanceRunner, SessionListener, SessionState};
pub use models::{Instance, JarMod};
pub use platform::{OsKind, Platform};
