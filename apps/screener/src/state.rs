use std::sync::Arc;

use crate::extract::TextExtractor;
use crate::llm_client::ScoringOracle;
use crate::screening::quota::Clock;
use crate::sources::CandidateSource;
use crate::storage::{IdempotencyLedger, ProfileStore, ResultSink};

/// External collaborators the screening pipeline runs against.
/// Built once at startup from `Config`; swapped for fakes in tests.
#[derive(Clone)]
pub struct ScreeningServices {
    pub profiles: Arc<dyn ProfileStore>,
    pub source: Arc<dyn CandidateSource>,
    pub extractor: Arc<dyn TextExtractor>,
    pub oracle: Arc<dyn ScoringOracle>,
    pub ledger: Arc<dyn IdempotencyLedger>,
    pub sink: Arc<dyn ResultSink>,
    pub clock: Arc<dyn Clock>,
}
