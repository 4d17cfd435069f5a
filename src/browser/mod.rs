pub mod chrome_page;
pub mod launcher;

pub use chrome_page::ChromePage;
pub use launcher::{connect_to_browser, launch_headless_browser, BrowserMode, ChromeLauncher, ChromeSession};
