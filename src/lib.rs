pub mod analyzer;
pub mod chunker;
pub mod cli;
pub mod combiner;
pub mod company;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod source;
pub mod util;
