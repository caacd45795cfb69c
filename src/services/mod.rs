//! Service layer modules for external integrations and document processing.
//!
//! Contains the LLM gateway, prompt construction, model-output
//! normalization, and PDF text extraction.

pub mod extractor;
pub mod llm_client;
pub mod normalize;
pub mod prompts;

pub use llm_client::LlmClient;
