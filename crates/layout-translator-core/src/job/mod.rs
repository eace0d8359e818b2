//! Job orchestration: one translation task per submitted document.
//!
//! A task moves through `Started → Extracting → Translating → Reassembling →
//! Completed`, or to `Failed` from any stage. Extraction and reassembly are
//! CPU-bound and run on the blocking pool; translation fans out through the
//! [`TranslationDispatcher`].

mod store;

pub use store::ResultStore;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::TranslationCache;
use crate::config::{AppConfig, JobConfig, Lang};
use crate::dispatch::TranslationDispatcher;
use crate::error::{Error, Result};
use crate::pdf::{DocumentReassembler, Element, ElementExtractor, Page, PdfDocument};
use crate::progress::{ProgressSnapshot, ProgressTracker, TaskId, TaskState};
use crate::translator::{Translator, create_translator};

/// Runs translation jobs and answers progress and result queries.
///
/// Cheap to clone; clones share the tracker, cache and result store.
#[derive(Clone)]
pub struct TaskOrchestrator {
    dispatcher: TranslationDispatcher,
    reassembler: Arc<DocumentReassembler>,
    tracker: ProgressTracker,
    store: Arc<ResultStore>,
    job: JobConfig,
}

impl TaskOrchestrator {
    pub fn new(
        dispatcher: TranslationDispatcher,
        reassembler: DocumentReassembler,
        job: JobConfig,
    ) -> Result<Self> {
        Ok(Self {
            dispatcher,
            reassembler: Arc::new(reassembler),
            tracker: ProgressTracker::new(),
            store: Arc::new(ResultStore::new()?),
            job,
        })
    }

    /// Build everything from configuration, using the configured provider.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let translator = create_translator(&config.translator)?;
        Self::with_translator(translator, config)
    }

    /// Build from configuration with a caller-supplied translator.
    pub fn with_translator(translator: Arc<dyn Translator>, config: &AppConfig) -> Result<Self> {
        let cache = TranslationCache::new(&config.cache)?;
        let dispatcher = TranslationDispatcher::new(translator, cache, &config.dispatch);
        let reassembler = DocumentReassembler::from_config(&config.render)?;
        Self::new(dispatcher, reassembler, config.job.clone())
    }

    pub const fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub const fn dispatcher(&self) -> &TranslationDispatcher {
        &self.dispatcher
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Start translating `bytes` in the background and return its task id.
    pub fn submit_job(&self, bytes: Vec<u8>, target: Lang) -> TaskId {
        let task_id = TaskId::new();
        self.tracker.start(&task_id);
        info!("Submitted task {} ({} bytes, target {})", task_id, bytes.len(), target);

        let orchestrator = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            // Failures are recorded in the tracker
            let _ = orchestrator.run_job(&id, bytes, &target).await;
        });

        task_id
    }

    /// Run the whole pipeline for one task and record the outcome.
    pub async fn run_job(&self, task_id: &TaskId, bytes: Vec<u8>, target: &Lang) -> Result<()> {
        match self.execute(task_id, bytes, target).await {
            Ok(()) => {
                self.tracker.update(task_id, 100, TaskState::Completed);
                info!("Task {} completed", task_id);
                Ok(())
            }
            Err(e) => {
                error!("Task {} failed: {}", task_id, e);
                self.tracker.fail(task_id, TaskState::Failed.label());
                Err(e)
            }
        }
    }

    async fn execute(&self, task_id: &TaskId, bytes: Vec<u8>, target: &Lang) -> Result<()> {
        self.store.stage_input(task_id, &bytes).await?;

        self.tracker.update(task_id, 0, TaskState::Extracting);
        let (doc, pages) = tokio::task::spawn_blocking(move || -> Result<_> {
            let doc = PdfDocument::from_bytes(bytes)?;
            let pages = ElementExtractor::new(&doc).extract_document()?;
            Ok((doc, pages))
        })
        .await
        .map_err(|e| Error::Worker(e.to_string()))??;

        let runs: Vec<&str> = pages
            .iter()
            .flat_map(Page::text_elements)
            .map(|element| element.text.as_str())
            .collect();
        debug!(
            "Task {}: {} pages, {} text runs",
            task_id,
            pages.len(),
            runs.len()
        );

        self.tracker.update(task_id, 0, TaskState::Translating);
        let translations = self
            .dispatcher
            .translate_runs(&runs, target, |percent| {
                self.tracker.update(task_id, percent, TaskState::Translating);
            })
            .await;
        self.dispatcher.cache().flush();

        let translated = apply_translations(pages, &translations);

        self.tracker.update(task_id, 0, TaskState::Reassembling);
        let reassembler = Arc::clone(&self.reassembler);
        let source = doc.bytes_arc();
        let lang = target.clone();
        let output = tokio::task::spawn_blocking(move || {
            reassembler.reassemble(&source, &translated, &lang)
        })
        .await
        .map_err(|e| Error::Worker(e.to_string()))??;

        self.store.store_result(task_id, &output).await?;
        if let Err(e) = self.store.remove_input(task_id).await {
            warn!("Failed to remove staged input for {}: {}", task_id, e);
        }
        Ok(())
    }

    /// Progress of a task; unknown ids read as pending.
    pub fn get_progress(&self, task_id: &TaskId) -> ProgressSnapshot {
        self.tracker.read(task_id)
    }

    /// The translated document of a completed task.
    pub async fn get_result(&self, task_id: &TaskId) -> Result<Vec<u8>> {
        let Some(progress) = self.tracker.get(task_id) else {
            return Err(Error::TaskNotFound(task_id.to_string()));
        };

        match progress.state {
            TaskState::Completed => self
                .store
                .read_result(task_id)
                .await?
                .ok_or_else(|| Error::TaskNotFound(task_id.to_string())),
            TaskState::Failed => Err(Error::TaskNotFound(task_id.to_string())),
            _ => Err(Error::TaskNotReady(task_id.to_string())),
        }
    }

    /// Translate a free-standing snippet.
    pub async fn translate_text(&self, text: &str, target: &Lang) -> String {
        self.dispatcher.translate_text(text, target).await
    }

    /// Forget finished tasks older than `max_age` and delete their files.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let evicted = self.tracker.evict_finished(max_age);
        for task_id in &evicted {
            self.store.remove(task_id);
        }
        evicted.len()
    }

    /// Start the background sweeper with the configured retention window.
    pub fn spawn_retention_sweeper(&self) -> JoinHandle<()> {
        self.spawn_sweeper(
            Duration::from_secs(self.job.sweep_interval_seconds.max(1)),
            Duration::from_secs(self.job.retention_seconds),
        )
    }

    /// Sweep every `interval` in the background.
    pub fn spawn_sweeper(&self, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let removed = orchestrator.sweep(max_age);
                info!("Completed task cleanup, removed {}", removed);
            }
        })
    }
}

/// Replace each text element's content with its translation.
fn apply_translations(pages: Vec<Page>, translations: &HashMap<String, String>) -> Vec<Page> {
    pages
        .into_iter()
        .map(|page| Page {
            elements: page
                .elements
                .into_iter()
                .map(|element| match element {
                    Element::Text(text) => match translations.get(&text.text) {
                        Some(translated) => Element::Text(text.with_text(translated.as_str())),
                        None => Element::Text(text),
                    },
                    Element::Image(image) => Element::Image(image),
                })
                .collect(),
            ..page
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, DispatchConfig};
    use crate::pdf::{BoundingBox, TextElement};
    use crate::translator::TranslatorInfo;
    use async_trait::async_trait;

    struct Upper;

    #[async_trait]
    impl Translator for Upper {
        fn info(&self) -> TranslatorInfo {
            TranslatorInfo {
                name: "Upper",
                requires_api_key: false,
                supports_auto_detect: true,
            }
        }

        async fn translate(&self, text: &str, _source: &Lang, _target: &Lang) -> Result<String> {
            Ok(text.to_uppercase())
        }
    }

    fn orchestrator() -> TaskOrchestrator {
        let config = AppConfig {
            cache: CacheConfig::memory_only(),
            dispatch: DispatchConfig::default(),
            ..AppConfig::default()
        };
        TaskOrchestrator::with_translator(Arc::new(Upper), &config).unwrap()
    }

    fn text(s: &str) -> Element {
        Element::Text(TextElement {
            text: s.to_string(),
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            font_size: None,
            font_name: None,
            color: None,
            line_count: 1,
        })
    }

    #[test]
    fn test_apply_translations_keeps_unknown_text() {
        let page = Page {
            index: 0,
            width: 100.0,
            height: 100.0,
            elements: vec![text("hi"), text("keep")],
        };
        let map = HashMap::from([("hi".to_string(), "HI".to_string())]);

        let pages = apply_translations(vec![page], &map);
        let texts: Vec<_> = pages[0].text_elements().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["HI", "keep"]);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let orchestrator = orchestrator();
        let id = TaskId::from("missing");
        assert_eq!(orchestrator.get_progress(&id), ProgressSnapshot::pending());
        assert!(matches!(
            orchestrator.get_result(&id).await,
            Err(Error::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_running_task_is_not_ready() {
        let orchestrator = orchestrator();
        let id = TaskId::new();
        orchestrator.tracker().start(&id);
        assert!(matches!(
            orchestrator.get_result(&id).await,
            Err(Error::TaskNotReady(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_input_fails_task() {
        let orchestrator = orchestrator();
        let id = TaskId::new();
        orchestrator.tracker().start(&id);

        let result = orchestrator
            .run_job(&id, b"not a pdf".to_vec(), &Lang::new("fr"))
            .await;

        assert!(matches!(result, Err(Error::PdfOpen(_))));
        let snap = orchestrator.get_progress(&id);
        assert_eq!(snap.percent, 0);
        assert_eq!(snap.status, "error");
        assert!(matches!(
            orchestrator.get_result(&id).await,
            Err(Error::TaskNotFound(_))
        ));
        // staged input stays until the sweep
        assert!(orchestrator.store().input_path(&id).exists());
        assert_eq!(orchestrator.sweep(Duration::ZERO), 1);
        assert!(!orchestrator.store().input_path(&id).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_in_background() {
        let orchestrator = orchestrator();
        let id = TaskId::new();
        orchestrator.tracker().start(&id);
        orchestrator.tracker().update(&id, 100, TaskState::Completed);

        let handle = orchestrator.spawn_sweeper(Duration::from_secs(1), Duration::ZERO);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(orchestrator.tracker().get(&id).is_none());
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retention_sweeper_keeps_recent_tasks() {
        let orchestrator = orchestrator();
        let id = TaskId::new();
        orchestrator.tracker().start(&id);
        orchestrator.tracker().update(&id, 100, TaskState::Completed);

        // default retention is an hour, sweeps every five minutes
        let handle = orchestrator.spawn_retention_sweeper();
        tokio::time::sleep(Duration::from_secs(301)).await;

        assert!(orchestrator.tracker().get(&id).is_some());
        handle.abort();
    }

    #[tokio::test]
    async fn test_translate_text() {
        let orchestrator = orchestrator();
        assert_eq!(
            orchestrator.translate_text("hello", &Lang::new("de")).await,
            "HELLO"
        );
    }
}
