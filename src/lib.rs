//! Backend for drafting RFP responses: a knowledge base of categorized
//! document chunks, proposal records with versioned sections, and LLM
//! agents that draft and assemble proposals against the knowledge base.

pub mod agent;
pub mod core;
pub mod db;
pub mod documents;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
