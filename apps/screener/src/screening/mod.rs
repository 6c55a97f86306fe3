pub mod job_match;
pub mod parser;
pub mod pipeline;
pub mod quota;
pub mod report;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;
