//! File-level orchestration
//!
//! One file at a time: read, detect the kind, translate, write. Inside an
//! event file the pages are independent and run on a bounded pool of
//! tokio tasks; every page is put back at its own pointer so the output
//! keeps the input's order whatever order the workers finish in.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rpgtl::Page;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::batch::BatchTranslator;
use crate::error::{MtError, MtResult};
use crate::extract::{PageExtractor, PageOutcome};
use crate::files::database::DatabaseTranslator;
use crate::files::{FileKind, page_pointers, record_count};
use crate::io::{output_path, read_json, write_json};
use crate::progress::{NoProgress, ProgressSink};
use crate::tokens::TokenUsage;

/// Result of translating one file
#[derive(Debug)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub usage: TokenUsage,
    pub elapsed: Duration,
    /// At least one dialogue batch came back with the wrong item count
    pub mismatch: bool,
    pub error: Option<MtError>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Display name used in reports
    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string())
    }
}

/// Result of translating one parsed tree
#[derive(Debug, Default)]
pub struct TreeOutcome {
    pub usage: TokenUsage,
    pub mismatch: bool,
    /// First page or field failure; the tree is partially translated
    pub error: Option<MtError>,
}

/// Drives the page and database translators over whole files
pub struct Runner {
    extractor: PageExtractor,
    database: DatabaseTranslator,
    progress: Arc<dyn ProgressSink>,
}

type PageResult = (String, Value, MtResult<(Page, PageOutcome)>);

impl Runner {
    pub fn new(translator: Arc<BatchTranslator>) -> Self {
        Self {
            extractor: PageExtractor::new(translator.clone()),
            database: DatabaseTranslator::new(translator),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    fn translator(&self) -> &BatchTranslator {
        self.extractor.translator()
    }

    /// Translate a parsed file tree in place.
    ///
    /// Page failures do not stop the other pages; the failed page keeps its
    /// source records and the first error is reported.
    pub async fn translate_tree(&self, kind: FileKind, label: &str, root: &mut Value) -> TreeOutcome {
        let mut outcome = TreeOutcome::default();

        if !kind.has_pages() {
            self.progress.start(label, DatabaseTranslator::entity_count(root));
            match self.database.translate(kind, root, self.progress.as_ref()).await {
                Ok(usage) => outcome.usage = usage,
                Err(err) => outcome.error = Some(err),
            }
            self.progress.finish();
            return outcome;
        }

        let pointers = page_pointers(kind, root);
        self.progress.start(label, record_count(root, &pointers));

        if kind == FileKind::Map {
            match self.database.translate_map_name(root).await {
                Ok(usage) => outcome.usage += usage,
                Err(err) => {
                    warn!(file = label, error = %err, "map name failed");
                    outcome.error = Some(err);
                }
            }
        }

        let permits = Arc::new(Semaphore::new(self.translator().config().threads.max(1)));
        let mut tasks: JoinSet<PageResult> = JoinSet::new();

        for pointer in pointers {
            let Some(slot) = root.pointer_mut(&pointer) else {
                continue;
            };
            let original = slot.take();
            let extractor = self.extractor.clone();
            let progress = self.progress.clone();
            let permits = permits.clone();

            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => match Page::from_value(original.clone()) {
                        Ok(page) => extractor.translate_page(page, progress.as_ref()).await,
                        Err(err) => Err(err.into()),
                    },
                    Err(err) => Err(MtError::Task(err.to_string())),
                };
                (pointer, original, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (pointer, original, result) = match joined {
                Ok(done) => done,
                Err(err) => {
                    // the page value went down with the task; nothing to restore
                    warn!(file = label, error = %err, "page task failed");
                    outcome.error.get_or_insert(MtError::Task(err.to_string()));
                    continue;
                }
            };
            let restored = match result {
                Ok((page, page_outcome)) => {
                    outcome.usage += page_outcome.usage;
                    outcome.mismatch |= page_outcome.mismatch.is_some();
                    page.into_value()
                }
                Err(err) => {
                    warn!(file = label, page = %pointer, error = %err, "page failed");
                    outcome.error.get_or_insert(err);
                    original
                }
            };
            if let Some(slot) = root.pointer_mut(&pointer) {
                *slot = restored;
            }
        }

        self.progress.finish();
        outcome
    }

    /// Translate one file into `output_dir`.
    ///
    /// Nothing is written when the file fails or in estimate mode.
    pub async fn translate_file(&self, input: &Path, output_dir: &Path) -> FileOutcome {
        let started = Instant::now();
        let mut outcome = FileOutcome {
            file: input.to_path_buf(),
            usage: TokenUsage::default(),
            elapsed: Duration::ZERO,
            mismatch: false,
            error: None,
        };
        let label = outcome.file_name();
        info!(file = %label, "translating");

        let result = self.run_file(input, output_dir, &label, &mut outcome).await;
        if let Err(err) = result {
            outcome.error.get_or_insert(err);
        }
        outcome.elapsed = started.elapsed();

        match &outcome.error {
            None => info!(
                file = %label,
                input_tokens = outcome.usage.input,
                output_tokens = outcome.usage.output,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "done"
            ),
            Some(err) => warn!(file = %label, error = %err, "file failed"),
        }
        outcome
    }

    async fn run_file(
        &self,
        input: &Path,
        output_dir: &Path,
        label: &str,
        outcome: &mut FileOutcome,
    ) -> MtResult<()> {
        let kind = FileKind::detect(input)?;
        let mut root = read_json(input)?;

        let tree = self.translate_tree(kind, label, &mut root).await;
        outcome.usage = tree.usage;
        outcome.mismatch = tree.mismatch;
        if let Some(err) = tree.error {
            return Err(err);
        }

        if self.translator().config().estimate {
            return Ok(());
        }
        write_json(&output_path(output_dir, input)?, &root)
    }

    /// Translate files one after another
    pub async fn translate_files(&self, inputs: &[PathBuf], output_dir: &Path) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(inputs.len());
        for input in inputs {
            outcomes.push(self.translate_file(input, output_dir).await);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockMode, MockModel};
    use crate::progress::testing::CountingProgress;
    use crate::retry::RetryPolicy;
    use rpgtl::TranslationConfig;
    use serde_json::json;

    fn runner(model: Arc<MockModel>, config: TranslationConfig) -> Runner {
        let translator = BatchTranslator::new(model, Arc::new(config))
            .unwrap()
            .with_retry(RetryPolicy::immediate(1));
        Runner::new(Arc::new(translator))
    }

    fn page(lines: &[&str]) -> Value {
        let mut list: Vec<Value> = lines
            .iter()
            .map(|l| json!({"code": 401, "indent": 0, "parameters": [l]}))
            .collect();
        list.push(json!({"code": 0, "indent": 0, "parameters": []}));
        Value::Array(list)
    }

    // ========== Tree Tests ==========

    #[tokio::test]
    async fn test_pages_keep_their_positions() {
        let model = Arc::new(MockModel::with_delay(MockMode::Suffix("[en]".into()), 5));
        let mut config = TranslationConfig::default();
        config.threads = 3;
        let runner = runner(model.clone(), config);

        let mut root = json!([
            null,
            {"id": 1, "list": page(&["いち"])},
            {"id": 2, "list": page(&["に"])},
            {"id": 3, "list": page(&["さん"])},
            {"id": 4, "list": page(&["よん"])}
        ]);
        let outcome = runner
            .translate_tree(FileKind::CommonEvents, "CommonEvents.json", &mut root)
            .await;

        assert!(outcome.error.is_none());
        assert!(!outcome.mismatch);
        assert_eq!(model.calls(), 4);
        for (i, word) in ["いち", "に", "さん", "よん"].iter().enumerate() {
            let text = root[i + 1]["list"][0]["parameters"][0].as_str().unwrap();
            assert_eq!(text, format!("{word} [en]"));
            assert_eq!(root[i + 1]["id"], json!(i + 1));
        }
    }

    #[tokio::test]
    async fn test_failed_page_keeps_source() {
        let model = Arc::new(MockModel::new(MockMode::Error(401)));
        let runner = runner(model, TranslationConfig::default());
        let mut root = json!([null, {"id": 1, "list": page(&["こんにちは"])}]);
        let before = root.clone();

        let outcome = runner
            .translate_tree(FileKind::CommonEvents, "CommonEvents.json", &mut root)
            .await;
        assert!(outcome.error.is_some());
        assert_eq!(root, before);
    }

    #[tokio::test]
    async fn test_progress_totals() {
        let model = Arc::new(MockModel::new(MockMode::Echo));
        let progress = Arc::new(CountingProgress::default());
        let runner = runner(model, TranslationConfig::default()).with_progress(progress.clone());
        let mut root = json!({"events": [null, {"pages": [{"list": page(&["あ", "い"])}]}]});

        runner.translate_tree(FileKind::Map, "Map001.json", &mut root).await;
        assert_eq!(progress.total.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(progress.done(), 3);
    }

    // ========== File Tests ==========

    #[tokio::test]
    async fn test_unsupported_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Animations.json");
        std::fs::write(&input, "[]").unwrap();

        let model = Arc::new(MockModel::new(MockMode::Echo));
        let outcome = runner(model, TranslationConfig::default())
            .translate_file(&input, &dir.path().join("out"))
            .await;
        assert!(matches!(outcome.error, Some(MtError::UnsupportedFile(_))));
        assert!(!dir.path().join("out").exists());
    }
}
