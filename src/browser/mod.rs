mod cdp;
mod discovery;
mod driver;
mod launcher;
mod session;

pub use cdp::CdpDriver;
pub use discovery::{discover_all_browsers, BrowserInfo, BrowserType};
pub use driver::{BrowserCookie, PortalDriver, SelectOption};
pub use session::start_session;
