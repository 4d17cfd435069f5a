pub mod criteria;
pub mod grid;
pub mod image_set;
pub mod loaders;
pub mod outcome;
pub mod record;

pub use criteria::{DateRange, ExportMode, ModeKind, SearchCriteria, SearchMode};
pub use grid::ResultGrid;
pub use image_set::DocumentImageSet;
pub use loaders::{load_search_criteria, RunInput};
pub use outcome::{RunOutcome, RunStatus};
pub use record::Record;
