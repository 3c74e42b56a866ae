//! Seeded stand-in for the external generator.
//!
//! Reads the Snapshot out of the request payload and writes a grounded,
//! compliant candidate. The seed only varies phrasing and evidence order, so
//! two runs with the same seed and Snapshot produce identical text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use groundline_core::domain::conclusion::Conclusion;
use groundline_core::domain::snapshot::{Band, Snapshot};
use groundline_core::evidence::EvidenceIndex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::llm::{ConclusionGenerator, GeneratorOutput};

#[derive(Clone, Copy, Debug)]
pub struct MockGenerator {
    seed: u64,
}

struct PatternTemplate {
    id: &'static str,
    sentences: [&'static str; 2],
    decisions: [&'static str; 2],
    why: &'static str,
    boundary: &'static str,
}

const SLOW_DECISIONS: PatternTemplate = PatternTemplate {
    id: "slow_quote_decisions",
    sentences: [
        "Customers are taking longer than usual to say yes to quotes.",
        "Quotes sit open for days before customers decide.",
    ],
    decisions: [
        "Within 7 days: Call every open quote older than 7 days.",
        "Within 5 days: Follow up on the five oldest open quotes.",
    ],
    why: "Decision lag is stretching while quotes keep arriving.",
    boundary: "If most open quotes are answered within 3 days, stop the extra calls.",
};

const SLOW_PAYMENTS: PatternTemplate = PatternTemplate {
    id: "slow_invoice_payments",
    sentences: [
        "Invoices are being paid later than the work is finished.",
        "Cash is arriving well after jobs are invoiced.",
    ],
    decisions: [
        "Within 7 days: Send a payment reminder on every invoice unpaid after 14 days.",
        "Within 7 days: Require a deposit on new jobs over the usual size.",
    ],
    why: "Payment lag sits in the slower bands for most paid invoices.",
    boundary: "If most invoices are paid within 7 days, drop the deposit requirement.",
};

const UNEVEN_REVENUE: PatternTemplate = PatternTemplate {
    id: "uneven_daily_revenue",
    sentences: [
        "Revenue arrives in bursts with quiet days in between.",
        "Daily revenue swings widely from one day to the next.",
    ],
    decisions: [
        "Within 7 days: Book two small fill-in jobs for the quietest weekdays.",
        "Within 7 days: Offer a weekday slot discount on open quotes.",
    ],
    why: "Volatility is high enough that quiet days are costing capacity.",
    boundary: "If daily revenue steadies for two weeks, pause the weekday offer.",
};

const STEADY_ACTIVITY: PatternTemplate = PatternTemplate {
    id: "steady_activity",
    sentences: [
        "Quote and invoice activity is holding a steady rhythm.",
        "Work is flowing at a consistent pace across the window.",
    ],
    decisions: [
        "Within 7 days: Review pricing on the three most common job sizes.",
        "Within 7 days: Raise the call-out fee on new quotes by a small step.",
    ],
    why: "A steady stretch is the safest time to test a price change.",
    boundary: "If approvals drop after the change, return to the previous price.",
};

impl MockGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn conclusion_for(&self, snapshot: &Snapshot) -> Conclusion {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let template = pick_template(snapshot);
        let variant = usize::from(rng.gen_bool(0.5));

        let mut evidence_signals = EvidenceIndex::build(snapshot).deterministic_patch(snapshot);
        evidence_signals.shuffle(&mut rng);

        let season = &snapshot.season;
        Conclusion {
            pattern_id: template.id.to_string(),
            one_sentence_pattern: template.sentences[variant].to_string(),
            decision: template.decisions[variant].to_string(),
            why_this_now: template.why.to_string(),
            boundary: template.boundary.to_string(),
            confidence: snapshot.sample_confidence(),
            evidence_signals,
            season_context: format!(
                "{} season with {} strength.",
                season.phase,
                season.strength.as_str()
            ),
            optional_next_steps: Vec::new(),
        }
    }
}

fn pick_template(snapshot: &Snapshot) -> &'static PatternTemplate {
    let quotes = &snapshot.activity_signals.quotes;
    let invoices = &snapshot.activity_signals.invoices;
    if quotes.decision_lag_band.is_some_and(|band| band >= Band::High) {
        &SLOW_DECISIONS
    } else if invoices
        .payment_lag_band_distribution
        .dominant()
        .is_some_and(|band| band >= Band::High)
    {
        &SLOW_PAYMENTS
    } else if snapshot.volatility_band >= Band::High {
        &UNEVEN_REVENUE
    } else {
        &STEADY_ACTIVITY
    }
}

#[async_trait]
impl ConclusionGenerator for MockGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, _system_prompt: &str, payload: &Value) -> Result<GeneratorOutput> {
        let snapshot_value =
            payload.get("snapshot").cloned().context("request payload has no snapshot")?;
        let snapshot: Snapshot =
            serde_json::from_value(snapshot_value).context("request snapshot did not decode")?;
        let raw = serde_json::to_string_pretty(&self.conclusion_for(&snapshot))
            .context("failed to encode mock conclusion")?;
        Ok(GeneratorOutput::from_raw(raw))
    }
}
