//! Upload ingestion: payload classification, text decoding and OCR.

pub mod normalizer;
pub mod ocr;

pub use normalizer::{InputNormalizer, PayloadKind};
pub use ocr::{OcrCell, OcrEngine, OcrEngineFactory, TesseractFactory};
