pub mod row_ctx;
pub mod row_flow;
pub mod search_flow;
pub mod viewer;

pub use row_ctx::RowCtx;
pub use row_flow::{DetailFields, RowExtractor, RowOutput};
pub use search_flow::{ReadySearch, RejectionCounter, SearchOrchestrator};
pub use viewer::{ImageOutcome, ViewerCapture, ViewerShape};
