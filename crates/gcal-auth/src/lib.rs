//! Google OAuth2 for gcal-automate.
//!
//! Loads the client secrets file, runs the installed-app consent flow and
//! keeps the resulting token cached and refreshed on disk.

pub mod google;
pub mod oauth;
pub mod session;
pub mod storage;

pub use google::{ClientSecret, GoogleOAuth2Provider, CALENDAR_SCOPE};
pub use oauth::InstalledFlow;
pub use session::{authorize, sign_in, TokenSource};
pub use storage::{TokenSet, TokenStore};
