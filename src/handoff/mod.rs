//! Worker handoff records: wire shape, extraction, and knowledge fan-out.

mod fanout;
mod parser;
mod record;

pub use fanout::record_handoff;
pub use parser::{extract_handoff, parse_handoff};
pub use record::{ContextForNext, Decision, HandoffOutcome, HandoffRecord};
