pub mod browser;
pub mod extract;
pub mod http;
pub mod pipeline;
pub mod traits;

pub use browser::BrowserPageSource;
pub use http::HttpPageSource;
pub use pipeline::Pipeline;
pub use traits::PageSource;
