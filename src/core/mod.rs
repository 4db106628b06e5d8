// core logic - routing, query vetting, storage reads and answer synthesis

mod ai;
mod extract;
mod pipeline;
mod record;
mod safety;
mod store;
mod summary;
mod table;

pub use ai::{Claude, Completion, CompletionRequest, LanguageModel, OpenAi, Provider, Usage};
pub use extract::extract_query;
pub use pipeline::{
    AskOptions, NO_DATABASE_NEEDED, PipelineConfig, RoutingDecision, SmartAnswer, SmartChat,
};
pub use record::{Record, Value, parse_records};
pub use safety::{Safety, is_safe_read_query};
pub use store::{MAX_ROWS, ReadRequest, RecordStore, Supabase};
pub use summary::{MAX_SECTIONS, NO_RECORDS, SUMMARY_FIELDS, summarize};
pub use table::{DEFAULT_TABLE, resolve_table, resolve_table_or};
