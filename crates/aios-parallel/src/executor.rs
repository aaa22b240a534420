//! Dual-provider orchestration
//!
//! Both provider calls are spawned as soon as an execution starts, whatever
//! the mode. The mode only decides how long to wait and how the two
//! outcomes are reduced. A branch that misses its deadline is treated as
//! failed, but its task is detached rather than cancelled, so a slow
//! provider may still finish its side effects after the result is returned.

use chrono::Utc;
use futures::future::{self, BoxFuture, Either, FutureExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use aios_router::ComplexityResult;

use crate::config::ParallelConfig;
use crate::error::ParallelError;
use crate::events::{ParallelEvent, EVENT_CAPACITY};
use crate::mode::ParallelMode;
use crate::provider::{ProviderError, ProviderResponse};
use crate::recommend::recommend_mode;
use crate::similarity::{jaccard_similarity, quality_score};
use crate::stats::{ParallelStats, StatsSnapshot};

/// What a provider call resolves to
pub type ProviderOutcome = Result<ProviderResponse, ProviderError>;

/// Label reported when merged output draws on both providers
pub const MERGED_PROVIDER: &str = "both";

type Branch = BoxFuture<'static, Result<String, ProviderError>>;

/// A branch that produced no usable output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFailure {
    pub provider: String,
    pub reason: String,
}

/// Heuristic scores computed in best-of mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestOfScores {
    pub primary: f64,
    pub secondary: f64,
}

/// Outcome of one execution. Failures are data, never a panic or `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelResult {
    pub execution: Uuid,
    pub success: bool,
    pub output: Option<String>,
    pub mode: ParallelMode,
    pub selected_provider: Option<String>,
    /// The output came from the secondary because the primary failed
    pub used_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<BestOfScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub failures: Vec<BranchFailure>,
    pub duration_ms: u64,
}

impl ParallelResult {
    fn pending(execution: Uuid, mode: ParallelMode) -> Self {
        Self {
            execution,
            success: false,
            output: None,
            mode,
            selected_provider: None,
            used_fallback: false,
            similarity: None,
            consensus: None,
            scores: None,
            error: None,
            failures: Vec::new(),
            duration_ms: 0,
        }
    }

    /// The delivered output, or [`ParallelError::BothProvidersFailed`]
    pub fn into_result(self) -> Result<String, ParallelError> {
        if self.success {
            Ok(self.output.unwrap_or_default())
        } else {
            Err(ParallelError::BothProvidersFailed {
                failures: self.failures,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Primary,
    Secondary,
}

/// Runs two provider calls concurrently and reduces them per [`ParallelMode`].
#[derive(Debug)]
pub struct ParallelExecutor {
    config: ParallelConfig,
    stats: ParallelStats,
    events: broadcast::Sender<ParallelEvent>,
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelExecutor {
    pub fn new() -> Self {
        Self::with_config(ParallelConfig::default())
    }

    pub fn with_config(config: ParallelConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            stats: ParallelStats::new(),
            events,
        }
    }

    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    pub fn mode(&self) -> ParallelMode {
        self.config.mode
    }

    /// Receive lifecycle events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ParallelEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run both calls with the configured mode
    pub async fn execute<P, S, FP, FS>(&self, primary: P, secondary: S) -> ParallelResult
    where
        P: FnOnce() -> FP + Send + 'static,
        S: FnOnce() -> FS + Send + 'static,
        FP: Future<Output = ProviderOutcome> + Send + 'static,
        FS: Future<Output = ProviderOutcome> + Send + 'static,
    {
        self.execute_with_mode(self.config.mode, primary, secondary)
            .await
    }

    /// Run both calls with the mode recommended for a classified task
    pub async fn execute_for<P, S, FP, FS>(
        &self,
        complexity: &ComplexityResult,
        primary: P,
        secondary: S,
    ) -> ParallelResult
    where
        P: FnOnce() -> FP + Send + 'static,
        S: FnOnce() -> FS + Send + 'static,
        FP: Future<Output = ProviderOutcome> + Send + 'static,
        FS: Future<Output = ProviderOutcome> + Send + 'static,
    {
        self.execute_with_mode(recommend_mode(complexity), primary, secondary)
            .await
    }

    /// Run both calls with an explicit mode, ignoring the configured one
    pub async fn execute_with_mode<P, S, FP, FS>(
        &self,
        mode: ParallelMode,
        primary: P,
        secondary: S,
    ) -> ParallelResult
    where
        P: FnOnce() -> FP + Send + 'static,
        S: FnOnce() -> FS + Send + 'static,
        FP: Future<Output = ProviderOutcome> + Send + 'static,
        FS: Future<Output = ProviderOutcome> + Send + 'static,
    {
        let start = Instant::now();
        let execution = Uuid::new_v4();
        self.stats.record_execution(mode);
        self.emit(ParallelEvent::Started {
            execution,
            mode,
            timestamp: Utc::now(),
        });
        debug!(%execution, %mode, "Launching providers");

        // the calls are made inside the tasks so a panicking closure is a branch failure
        let primary = branch(
            tokio::spawn(async move { primary().await }),
            self.config.timeout,
        );
        let secondary = branch(
            tokio::spawn(async move { secondary().await }),
            self.config.timeout,
        );

        let mut result = ParallelResult::pending(execution, mode);
        match mode {
            ParallelMode::Race => self.race(&mut result, primary, secondary).await,
            ParallelMode::Fallback => self.fallback(&mut result, primary, secondary).await,
            ParallelMode::Consensus | ParallelMode::BestOf | ParallelMode::Merge => {
                let (p, s) = future::join(primary, secondary).await;
                if let Some((p, s)) = self.both_succeeded(&mut result, p, s) {
                    match mode {
                        ParallelMode::Consensus => self.consensus(&mut result, p, s),
                        ParallelMode::BestOf => self.best_of(&mut result, p, s),
                        _ => self.merge(&mut result, p, s),
                    }
                }
            }
        }

        if result.used_fallback {
            self.stats.record_fallback();
        }
        if result.consensus == Some(true) {
            self.stats.record_consensus();
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        if result.success {
            info!(
                %execution,
                %mode,
                provider = result.selected_provider.as_deref().unwrap_or_default(),
                used_fallback = result.used_fallback,
                elapsed_ms = result.duration_ms,
                "Parallel execution completed"
            );
        } else {
            let err = ParallelError::BothProvidersFailed {
                failures: result.failures.clone(),
            };
            warn!(%execution, %mode, elapsed_ms = result.duration_ms, "{}", err);
            result.error = Some(err.to_string());
        }

        self.emit(ParallelEvent::Completed {
            execution,
            mode,
            success: result.success,
            selected_provider: result.selected_provider.clone(),
            duration_ms: result.duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    async fn race(&self, result: &mut ParallelResult, primary: Branch, secondary: Branch) {
        // `select` polls the primary first, so it wins a simultaneous finish
        match future::select(primary, secondary).await {
            Either::Left((Ok(output), _)) => self.deliver(result, Side::Primary, output),
            Either::Left((Err(err), secondary)) => {
                self.fail(result, Side::Primary, err);
                match secondary.await {
                    Ok(output) => self.deliver_fallback(result, output),
                    Err(err) => self.fail(result, Side::Secondary, err),
                }
            }
            Either::Right((Ok(output), _)) => self.deliver(result, Side::Secondary, output),
            Either::Right((Err(err), primary)) => {
                self.fail(result, Side::Secondary, err);
                match primary.await {
                    Ok(output) => self.deliver(result, Side::Primary, output),
                    Err(err) => self.fail(result, Side::Primary, err),
                }
            }
        }
    }

    async fn fallback(&self, result: &mut ParallelResult, primary: Branch, secondary: Branch) {
        match primary.await {
            Ok(output) => self.deliver(result, Side::Primary, output),
            Err(err) => {
                self.fail(result, Side::Primary, err);
                match secondary.await {
                    Ok(output) => self.deliver_fallback(result, output),
                    Err(err) => self.fail(result, Side::Secondary, err),
                }
            }
        }
    }

    /// Handle the cases where at most one branch succeeded; hand back both
    /// outputs otherwise.
    fn both_succeeded(
        &self,
        result: &mut ParallelResult,
        primary: Result<String, ProviderError>,
        secondary: Result<String, ProviderError>,
    ) -> Option<(String, String)> {
        match (primary, secondary) {
            (Ok(p), Ok(s)) => return Some((p, s)),
            (Ok(p), Err(err)) => {
                self.fail(result, Side::Secondary, err);
                self.deliver(result, Side::Primary, p);
            }
            (Err(err), Ok(s)) => {
                self.fail(result, Side::Primary, err);
                self.deliver_fallback(result, s);
            }
            (Err(p), Err(s)) => {
                self.fail(result, Side::Primary, p);
                self.fail(result, Side::Secondary, s);
            }
        }
        None
    }

    fn consensus(&self, result: &mut ParallelResult, primary: String, secondary: String) {
        let similarity = jaccard_similarity(&primary, &secondary);
        let agreed = similarity >= self.config.consensus_similarity;
        debug!(execution = %result.execution, similarity, agreed, "Consensus check");

        result.similarity = Some(similarity);
        result.consensus = Some(agreed);
        self.deliver(result, Side::Primary, primary);
    }

    fn best_of(&self, result: &mut ParallelResult, primary: String, secondary: String) {
        let scores = BestOfScores {
            primary: quality_score(&primary),
            secondary: quality_score(&secondary),
        };
        debug!(
            execution = %result.execution,
            primary = scores.primary,
            secondary = scores.secondary,
            "Best-of scores"
        );

        result.scores = Some(scores);
        if scores.secondary > scores.primary {
            self.deliver(result, Side::Secondary, secondary);
        } else {
            self.deliver(result, Side::Primary, primary);
        }
    }

    fn merge(&self, result: &mut ParallelResult, primary: String, secondary: String) {
        let merged = format!(
            "## {}\n\n{}\n\n## {}\n\n{}",
            self.config.primary_label, primary, self.config.secondary_label, secondary
        );
        result.success = true;
        result.output = Some(merged);
        result.selected_provider = Some(MERGED_PROVIDER.to_string());
    }

    fn deliver(&self, result: &mut ParallelResult, side: Side, output: String) {
        result.success = true;
        result.output = Some(output);
        result.selected_provider = Some(self.label(side).to_string());
    }

    /// Deliver the secondary's output after the primary failed
    fn deliver_fallback(&self, result: &mut ParallelResult, output: String) {
        self.deliver(result, Side::Secondary, output);
        result.used_fallback = true;
    }

    fn fail(&self, result: &mut ParallelResult, side: Side, err: ProviderError) {
        let provider = self.label(side);
        warn!(execution = %result.execution, provider, error = %err, "Provider branch failed");
        result.failures.push(BranchFailure {
            provider: provider.to_string(),
            reason: err.to_string(),
        });
    }

    fn label(&self, side: Side) -> &str {
        match side {
            Side::Primary => &self.config.primary_label,
            Side::Secondary => &self.config.secondary_label,
        }
    }

    fn emit(&self, event: ParallelEvent) {
        // no subscribers is not an error
        let _ = self.events.send(event);
    }
}

/// Wrap a spawned provider call in its deadline and normalize its outcome.
///
/// The deadline starts now, not when the branch is first polled, so a branch
/// awaited late (fallback) gets no extra time. Dropping the branch detaches
/// the task without cancelling it.
fn branch(handle: JoinHandle<ProviderOutcome>, timeout: Option<Duration>) -> Branch {
    let deadline = timeout.map(|limit| (tokio::time::Instant::now() + limit, limit));
    async move {
        let joined = match deadline {
            Some((at, limit)) => tokio::time::timeout_at(at, handle)
                .await
                .map_err(|_| ProviderError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => handle.await,
        };

        let response = joined.map_err(|e| ProviderError::Aborted(e.to_string()))??;
        if !response.success {
            return Err(ProviderError::Unsuccessful(response.error));
        }
        Ok(response.output.unwrap_or_default())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn reply(output: &'static str) -> ProviderOutcome {
        Ok(ProviderResponse::ok(output))
    }

    async fn refuse(reason: &'static str) -> ProviderOutcome {
        Err(ProviderError::failed(reason))
    }

    #[tokio::test]
    async fn test_branch_normalizes_unsuccessful_response() {
        let handle =
            tokio::spawn(async { Ok::<_, ProviderError>(ProviderResponse::failed("quota")) });
        let err = branch(handle, None).await.unwrap_err();
        assert_eq!(err, ProviderError::Unsuccessful(Some("quota".into())));
    }

    #[tokio::test]
    async fn test_branch_missing_output_is_empty() {
        let handle = tokio::spawn(async {
            Ok::<_, ProviderError>(ProviderResponse {
                success: true,
                ..Default::default()
            })
        });
        assert_eq!(branch(handle, None).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_fallback_labels_failures() {
        let executor = ParallelExecutor::with_config(
            ParallelConfig::default().with_labels("claude", "gemini"),
        );
        let result = executor
            .execute(|| refuse("Claude failed"), || reply("Gemini result"))
            .await;

        assert!(result.success);
        assert_eq!(result.selected_provider.as_deref(), Some("gemini"));
        assert!(result.used_fallback);
        assert_eq!(
            result.failures,
            vec![BranchFailure {
                provider: "claude".into(),
                reason: "Claude failed".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_one_sided_consensus_is_not_agreement() {
        let executor = ParallelExecutor::with_config(
            ParallelConfig::default().with_mode(ParallelMode::Consensus),
        );
        let result = executor.execute(|| reply("only me"), || refuse("down")).await;

        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("only me"));
        assert!(result.consensus.is_none());
        assert!(!result.used_fallback);
        assert_eq!(executor.stats().consensus_agreements, 0);
    }

    #[tokio::test]
    async fn test_into_result() {
        let executor = ParallelExecutor::new();
        let ok = executor.execute(|| reply("a"), || reply("b")).await;
        assert_eq!(ok.into_result().unwrap(), "a");

        let failed = executor.execute(|| refuse("x"), || refuse("y")).await;
        match failed.into_result() {
            Err(ParallelError::BothProvidersFailed { failures }) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
