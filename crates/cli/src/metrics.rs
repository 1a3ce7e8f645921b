use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

pub struct StageTimer {
    start: Instant,
}

impl StageTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed_ms: u64,
}

/// Counts and timings for one `run` invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub pages: usize,
    pub fields: usize,
    pub enriched_pages: usize,
    pub answers: usize,
    pub usable_answers: usize,
    pub parse_failures: usize,
    pub failed_pages: Vec<u32>,
    pub filled: bool,
    pub stages: Vec<StageTiming>,
}

impl RunSummary {
    pub fn record_stage(&mut self, stage: &'static str, timer: StageTimer) {
        let elapsed = timer.elapsed();
        info!(stage, elapsed_ms = elapsed.as_millis() as u64, "Stage complete");
        self.stages.push(StageTiming {
            stage,
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }

    pub fn total_ms(&self) -> u64 {
        self.stages.iter().map(|s| s.elapsed_ms).sum()
    }

    pub fn print(&self) {
        println!("\n=== SUMMARY ===");
        println!("  Pages:           {}", self.pages);
        println!("  Fields:          {}", self.fields);
        println!("  Enriched pages:  {}", self.enriched_pages);
        println!("  Answers:         {} ({} usable)", self.answers, self.usable_answers);
        println!("  Parse failures:  {}", self.parse_failures);
        if !self.failed_pages.is_empty() {
            println!("  Pages without answers: {:?}", self.failed_pages);
        }
        for stage in &self.stages {
            println!("  {:<16} {} ms", format!("{}:", stage.stage), stage.elapsed_ms);
        }
        println!("  Total:           {} ms", self.total_ms());
        println!("  Filled:          {}", if self.filled { "yes" } else { "no" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_totals() {
        let mut summary = RunSummary::default();
        summary.stages.push(StageTiming { stage: "extract", elapsed_ms: 5 });
        summary.stages.push(StageTiming { stage: "enrich", elapsed_ms: 1200 });
        summary.record_stage("fill", StageTimer::start());

        assert_eq!(summary.stages.len(), 3);
        assert!(summary.total_ms() >= 1205);
    }
}
