//! Synerise driver
//!
//! Maps commerce events onto the Synerise tracker (`SR` global). The
//! browser variant performs vendor calls; the server variant is inert.

pub mod browser;
pub mod sdk;
pub mod server;

pub use browser::{monetary_value, SyneriseBrowserDriver, SyneriseClient};
pub use sdk::{PageVisit, SdkError, SyneriseHandle, SyneriseSdk, GLOBAL_NAME};
pub use server::SyneriseServerDriver;
