//! LLM agents: ingestion chunking, initial drafting, section regeneration
//! and final proposal assembly, plus the retrieval tool they share.

pub mod drafting;
pub mod error;
pub mod ingestion;
pub mod instructions;
pub mod output;
pub mod retrieval;
pub mod tool_loop;
pub mod writer;

pub use error::AgentError;
pub use instructions::COLLECTION_CATEGORIES;
pub use retrieval::RetrievalTool;
pub use tool_loop::{run_tool_loop, AgentTool};
