//! Progress reporting for council sessions
//!
//! Two inputs drive the display: engine events from the broadcast publisher
//! (phase changes, agent status, consensus) and per-agent tool activity from
//! the [`ActivitySink`]. [`follow_events`] pumps the former into an observer.

use colored::Colorize;
use council_application::{ActivitySink, AgentActivity, CouncilEvent, events};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

/// Receives everything a live display renders
pub trait CouncilObserver: Send + Sync {
    fn on_event(&self, event: &CouncilEvent);

    fn on_activity(&self, activity: &AgentActivity);

    /// Called once when the run is over
    fn finish(&self) {}
}

/// Wrap an observer as the engine's activity sink
pub fn activity_sink(observer: Arc<dyn CouncilObserver>) -> ActivitySink {
    ActivitySink::new(move |activity| observer.on_activity(activity))
}

/// Forward published events to `observer` until cancelled or the channel closes.
pub async fn follow_events(
    mut events: broadcast::Receiver<CouncilEvent>,
    observer: Arc<dyn CouncilObserver>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => observer.on_event(&event),
                // Progress display only; a gap is acceptable
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }
}

/// One-line plain description of an event, `None` for events not shown.
pub fn describe_event(event: &CouncilEvent) -> Option<String> {
    let field = |key: &str| event.payload.get(key).and_then(|v| v.as_str()).unwrap_or("?");
    match event.name.as_str() {
        events::PHASE_CHANGED => Some(format!("Phase: {}", field("to"))),
        events::AGENT_STATUS_CHANGED => {
            let mut line = format!("{} {}", field("agent_id"), field("status").to_lowercase());
            if let Some(reason) = event.payload.get("reason").and_then(|v| v.as_str()) {
                line.push_str(&format!(" ({})", reason));
            }
            Some(line)
        }
        events::ISSUE_CONSENSUS => Some(format!(
            "{} -> {}",
            field("issue_id"),
            field("consensus_type")
        )),
        _ => None,
    }
}

pub fn describe_activity(activity: &AgentActivity) -> String {
    format!("{}: {} {}", activity.agent_id, activity.action, activity.target)
}

/// Reports progress with a phase spinner and one spinner per agent
pub struct ProgressReporter {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    agent_bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let phase_bar = multi.add(ProgressBar::new_spinner());
        phase_bar.set_style(Self::phase_style());
        phase_bar.set_prefix("council");
        phase_bar.set_message("starting");
        phase_bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            multi,
            phase_bar,
            agent_bars: Mutex::new(HashMap::new()),
        }
    }

    fn phase_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn agent_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("  {spinner:.blue} {prefix:.bold} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.agent_bars.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The agent's live bar, replacing one that already finished
    fn agent_bar(&self, agent_id: &str) -> ProgressBar {
        let mut bars = self.bars();
        if let Some(bar) = bars.get(agent_id)
            && !bar.is_finished()
        {
            return bar.clone();
        }
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::agent_style());
        bar.set_prefix(agent_id.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        bars.insert(agent_id.to_string(), bar.clone());
        bar
    }

    fn on_agent_status(&self, event: &CouncilEvent) {
        let payload = &event.payload;
        let Some(agent_id) = payload.get("agent_id").and_then(|v| v.as_str()) else {
            return;
        };
        let status = payload.get("status").and_then(|v| v.as_str()).unwrap_or("");
        let reason = payload.get("reason").and_then(|v| v.as_str());

        match status {
            "REVIEWING" => self.agent_bar(agent_id).set_message("working...".to_string()),
            "SUBMITTED" => {
                let bar = self.agent_bar(agent_id);
                bar.finish_with_message(format!("{}", "submitted".green()));
            }
            "FAILED" => {
                let bar = self.agent_bar(agent_id);
                bar.finish_with_message(format!(
                    "{} {}",
                    "failed".red(),
                    reason.unwrap_or_default().dimmed()
                ));
            }
            _ => {
                let bar = self.agent_bar(agent_id);
                bar.finish_with_message(format!(
                    "{}",
                    reason.unwrap_or("waiting").dimmed()
                ));
            }
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CouncilObserver for ProgressReporter {
    fn on_event(&self, event: &CouncilEvent) {
        match event.name.as_str() {
            events::PHASE_CHANGED => {
                let phase = event.payload.get("to").and_then(|v| v.as_str()).unwrap_or("?");
                self.phase_bar.set_message(phase.to_string());
            }
            events::AGENT_STATUS_CHANGED => self.on_agent_status(event),
            events::ISSUE_CONSENSUS => {
                if let Some(line) = describe_event(event) {
                    let _ = self.multi.println(format!("  {} {}", "*".yellow(), line));
                }
            }
            _ => {}
        }
    }

    fn on_activity(&self, activity: &AgentActivity) {
        let bar = self.agent_bar(&activity.agent_id);
        bar.set_message(format!("{} {}", activity.action.cyan(), activity.target));
    }

    fn finish(&self) {
        for bar in self.bars().values() {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
        self.phase_bar
            .finish_with_message(format!("{}", "done".green()));
    }
}

/// Simple line-based progress (no fancy UI), for non-terminal stderr
pub struct SimpleProgress;

impl CouncilObserver for SimpleProgress {
    fn on_event(&self, event: &CouncilEvent) {
        let Some(line) = describe_event(event) else {
            return;
        };
        if event.name == events::PHASE_CHANGED {
            eprintln!("{} {}", "->".cyan(), line.bold());
        } else {
            eprintln!("  {}", line);
        }
    }

    fn on_activity(&self, activity: &AgentActivity) {
        eprintln!("    {}", describe_activity(activity).dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Recorder(Mutex<Vec<String>>);

    impl CouncilObserver for Recorder {
        fn on_event(&self, event: &CouncilEvent) {
            self.0.lock().unwrap().push(event.name.clone());
        }

        fn on_activity(&self, activity: &AgentActivity) {
            self.0.lock().unwrap().push(describe_activity(activity));
        }
    }

    fn event(name: &str, payload: serde_json::Value) -> CouncilEvent {
        CouncilEvent {
            name: name.to_string(),
            payload,
        }
    }

    #[test]
    fn test_describe_events() {
        let phase = event(events::PHASE_CHANGED, json!({"from": "reviewing", "to": "dedup"}));
        assert_eq!(describe_event(&phase).unwrap(), "Phase: dedup");

        let failed = event(
            events::AGENT_STATUS_CHANGED,
            json!({"agent_id": "codex1", "status": "FAILED", "reason": "timed out"}),
        );
        assert_eq!(describe_event(&failed).unwrap(), "codex1 failed (timed out)");

        let consensus = event(
            events::ISSUE_CONSENSUS,
            json!({"issue_id": "issue-2", "consensus_type": "dismissed"}),
        );
        assert_eq!(describe_event(&consensus).unwrap(), "issue-2 -> dismissed");

        assert!(describe_event(&event("other", json!({}))).is_none());
    }

    #[test]
    fn test_activity_sink_forwards_to_observer() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let sink = activity_sink(recorder.clone());
        sink.notify("gemini1", "read", "src/main.rs");
        assert_eq!(*recorder.0.lock().unwrap(), vec!["gemini1: read src/main.rs"]);
    }

    #[tokio::test]
    async fn test_follow_events_stops_when_channel_closes() {
        let (tx, rx) = broadcast::channel(8);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        tx.send(event(events::PHASE_CHANGED, json!({"to": "reviewing"})))
            .unwrap();
        drop(tx);

        follow_events(rx, recorder.clone(), CancellationToken::new()).await;
        assert_eq!(*recorder.0.lock().unwrap(), vec![events::PHASE_CHANGED]);
    }

    #[tokio::test]
    async fn test_follow_events_stops_on_cancel() {
        let (_tx, rx) = broadcast::channel::<CouncilEvent>(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        follow_events(rx, Arc::new(SimpleProgress), cancel).await;
    }

    #[test]
    fn test_reporter_reuses_live_agent_bar() {
        let reporter = ProgressReporter::new();
        reporter.multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        reporter.on_event(&event(
            events::AGENT_STATUS_CHANGED,
            json!({"agent_id": "claude1", "status": "REVIEWING"}),
        ));
        let first = reporter.agent_bar("claude1");
        reporter.on_event(&event(
            events::AGENT_STATUS_CHANGED,
            json!({"agent_id": "claude1", "status": "SUBMITTED"}),
        ));
        assert!(first.is_finished());

        // A new invocation gets a fresh bar
        let second = reporter.agent_bar("claude1");
        assert!(!second.is_finished());
        reporter.finish();
    }
}
