//! OCR engine abstraction and the process-wide engine cell.
//!
//! The engine is expensive to start (Tesseract loads its trained data on
//! construction), so it is created at most once and shared by every request.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::ExtractionError;

/// Recognizes text in an encoded image (PNG, JPEG, TIFF, ...).
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Result<String, ExtractionError>;
}

/// Builds an [`OcrEngine`]. Called by [`OcrCell`] at most once per successful init.
#[async_trait]
pub trait OcrEngineFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn OcrEngine>, ExtractionError>;
}

/// Lazily initialized, shared OCR engine.
///
/// The first caller runs the factory; concurrent callers wait on that same
/// initialization. A failed initialization leaves the cell empty, so the next
/// caller tries again.
pub struct OcrCell {
    engine: OnceCell<Arc<dyn OcrEngine>>,
    factory: Arc<dyn OcrEngineFactory>,
}

impl OcrCell {
    pub fn new(factory: Arc<dyn OcrEngineFactory>) -> Self {
        Self {
            engine: OnceCell::new(),
            factory,
        }
    }

    /// Return the engine, initializing it on first use.
    pub async fn get_or_init(&self) -> Result<Arc<dyn OcrEngine>, ExtractionError> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                info!("Initializing OCR engine");
                let engine = self.factory.create().await;
                if let Err(ref e) = engine {
                    warn!(error = %e, "OCR engine initialization failed");
                }
                engine
            })
            .await?;
        Ok(Arc::clone(engine))
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }
}

// ── Tesseract ───────────────────────────────────────────────────────

/// Factory for the bundled Tesseract engine.
///
/// Without the `ocr` feature this factory always reports the engine as unavailable.
#[derive(Debug, Clone)]
pub struct TesseractFactory {
    /// Directory holding `*.traineddata`; `None` uses Tesseract's default lookup.
    pub datapath: Option<String>,
    /// Language spec, e.g. `eng` or `eng+fra`.
    pub language: String,
}

#[async_trait]
impl OcrEngineFactory for TesseractFactory {
    async fn create(&self) -> Result<Arc<dyn OcrEngine>, ExtractionError> {
        #[cfg(feature = "ocr")]
        {
            let engine = tesseract_worker::TesseractEngine::start(
                self.datapath.clone(),
                self.language.clone(),
            )
            .await?;
            Ok(Arc::new(engine))
        }
        #[cfg(not(feature = "ocr"))]
        {
            Err(ExtractionError::OcrUnavailable(
                "image uploads need a build with the `ocr` feature".into(),
            ))
        }
    }
}

#[cfg(feature = "ocr")]
mod tesseract_worker {
    use async_trait::async_trait;
    use tesseract::Tesseract;
    use tokio::sync::{mpsc, oneshot};
    use tracing::{debug, info};

    use super::OcrEngine;
    use crate::error::ExtractionError;

    struct Job {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<String, ExtractionError>>,
    }

    /// Tesseract instance owned by a dedicated OS thread; requests are queued to it.
    pub(super) struct TesseractEngine {
        jobs: mpsc::UnboundedSender<Job>,
    }

    impl TesseractEngine {
        /// Spawn the worker thread and wait until Tesseract has loaded.
        pub(super) async fn start(
            datapath: Option<String>,
            language: String,
        ) -> Result<Self, ExtractionError> {
            let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
            let (ready_tx, ready_rx) = oneshot::channel();

            std::thread::Builder::new()
                .name("tesseract-ocr".into())
                .spawn(move || {
                    let mut slot = match open(datapath.as_deref(), &language) {
                        Ok(t) => {
                            let _ = ready_tx.send(Ok(()));
                            Some(t)
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    while let Some(job) = rx.blocking_recv() {
                        let result = recognize(&mut slot, datapath.as_deref(), &language, &job.image);
                        let _ = job.reply.send(result);
                    }
                    debug!("OCR worker shutting down");
                })
                .map_err(|e| ExtractionError::OcrUnavailable(e.to_string()))?;

            ready_rx
                .await
                .map_err(|_| ExtractionError::OcrUnavailable("OCR worker exited during startup".into()))??;
            info!("Tesseract OCR engine ready");
            Ok(Self { jobs })
        }
    }

    fn open(datapath: Option<&str>, language: &str) -> Result<Tesseract, ExtractionError> {
        Tesseract::new(datapath, Some(language))
            .map_err(|e| ExtractionError::OcrUnavailable(format!("{e:?}")))
    }

    /// `set_image_from_mem` consumes the instance; a failed call leaves the slot
    /// empty and the next job reopens it.
    fn recognize(
        slot: &mut Option<Tesseract>,
        datapath: Option<&str>,
        language: &str,
        image: &[u8],
    ) -> Result<String, ExtractionError> {
        let tess = match slot.take() {
            Some(t) => t,
            None => open(datapath, language)?,
        };
        let mut tess = tess
            .set_image_from_mem(image)
            .map_err(|e| ExtractionError::OcrFailed(format!("{e:?}")))?;
        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrFailed(format!("{e:?}")))?;
        *slot = Some(tess);
        Ok(text)
    }

    #[async_trait]
    impl OcrEngine for TesseractEngine {
        async fn recognize(&self, image: &[u8]) -> Result<String, ExtractionError> {
            let (reply, rx) = oneshot::channel();
            self.jobs
                .send(Job {
                    image: image.to_vec(),
                    reply,
                })
                .map_err(|_| ExtractionError::OcrFailed("OCR worker is gone".into()))?;
            rx.await
                .map_err(|_| ExtractionError::OcrFailed("OCR worker dropped the job".into()))?
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Engine that returns a fixed string.
    pub(crate) struct FixedOcr(pub &'static str);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn recognize(&self, _image: &[u8]) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    /// Factory that counts how often it was asked to build an engine.
    pub(crate) struct CountingFactory {
        pub created: AtomicUsize,
        pub text: &'static str,
        pub delay: Duration,
        pub fail_first: bool,
    }

    impl CountingFactory {
        pub(crate) fn new(text: &'static str) -> Self {
            Self {
                created: AtomicUsize::new(0),
                text,
                delay: Duration::ZERO,
                fail_first: false,
            }
        }
    }

    #[async_trait]
    impl OcrEngineFactory for CountingFactory {
        async fn create(&self) -> Result<Arc<dyn OcrEngine>, ExtractionError> {
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail_first && n == 0 {
                return Err(ExtractionError::OcrUnavailable("first start fails".into()));
            }
            Ok(Arc::new(FixedOcr(self.text)))
        }
    }

    #[tokio::test]
    async fn concurrent_first_use_initializes_once() {
        let factory = Arc::new(CountingFactory {
            delay: Duration::from_millis(50),
            ..CountingFactory::new("hello")
        });
        let cell = Arc::new(OcrCell::new(factory.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cell = Arc::clone(&cell);
            handles.push(tokio::spawn(async move {
                cell.get_or_init().await.map(|_| ())
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert!(cell.is_initialized());
    }

    #[tokio::test]
    async fn engine_is_reused_across_calls() {
        let factory = Arc::new(CountingFactory::new("text"));
        let cell = OcrCell::new(factory.clone());
        let a = cell.get_or_init().await.unwrap();
        let b = cell.get_or_init().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_init_is_retried_by_next_caller() {
        let factory = Arc::new(CountingFactory {
            fail_first: true,
            ..CountingFactory::new("text")
        });
        let cell = OcrCell::new(factory.clone());

        assert!(cell.get_or_init().await.is_err());
        assert!(!cell.is_initialized());
        assert!(cell.get_or_init().await.is_ok());
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[cfg(not(feature = "ocr"))]
    #[tokio::test]
    async fn tesseract_without_feature_is_unavailable() {
        let factory = TesseractFactory {
            datapath: None,
            language: "eng".into(),
        };
        let err = factory.create().await.err().unwrap();
        assert!(matches!(err, ExtractionError::OcrUnavailable(_)));
    }
}
