pub mod criteria;
pub mod events;
pub mod filters;
pub mod offer;
pub mod progress;
pub mod source;

pub use criteria::{CriteriaError, SearchCriteria};
pub use events::{NoticeLevel, SearchEvent, SystemNotice};
pub use filters::{default_sort, sort_offers, FlightFilters, SortKey, SortOrder};
pub use offer::FlightOffer;
pub use progress::{ProgressError, SearchProgress, SearchStatus, SourceError, SourceErrorKind};
pub use source::{AdapterError, AdapterHealth, SearchAdapter};
