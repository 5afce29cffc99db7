//! Analysis-engine contract.
//!
//! The engine scores a catalog's rate set for one analysis run. Its internals
//! are a collaborator concern; the orchestrator only ranks the returned rates
//! by `value` and reads `energetic_value`/`gv` for timing refinement.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::host::Rate;
use crate::random::RandomSource;
use crate::types::{HostAnalysisId, Symbol};

/// A rate plus the scoring attributes assigned by one analysis run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedRate {
    pub signature: Symbol,
    pub value: i64,
    pub energetic_value: i64,
    pub gv: i64,
}

pub trait AnalysisEngine: Send + Sync {
    fn analyze(
        &self,
        analysis_id: HostAnalysisId,
        rates: &[Rate],
        random: &dyn RandomSource,
        check_gv: bool,
        advanced: bool,
    ) -> Result<Vec<EnhancedRate>>;
}

/// Default engine: scores every rate from the randomness source.
///
/// `check_gv` draws a general-vitality value per rate (a fixed midpoint is
/// used otherwise); `advanced` averages a second value draw into the score.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomizedAnalysis;

impl AnalysisEngine for RandomizedAnalysis {
    fn analyze(
        &self,
        _analysis_id: HostAnalysisId,
        rates: &[Rate],
        random: &dyn RandomSource,
        check_gv: bool,
        advanced: bool,
    ) -> Result<Vec<EnhancedRate>> {
        let enhanced = rates
            .iter()
            .map(|rate| {
                let mut value = random.next_int(0, 1000);
                if advanced {
                    value = (value + random.next_int(0, 1000)) / 2;
                }
                EnhancedRate {
                    signature: rate.signature.clone(),
                    value,
                    energetic_value: random.next_int(0, 1000),
                    gv: if check_gv {
                        random.next_int(0, 1000)
                    } else {
                        500
                    },
                }
            })
            .collect();
        Ok(enhanced)
    }
}
