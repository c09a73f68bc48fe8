// Legally Core Services

pub mod text_processor;
pub mod config_store;
pub mod providers;
pub mod analysis;
pub mod pdf_intake;
pub mod history_store;
pub mod document_service;

pub use text_processor::*;
pub use config_store::*;
pub use providers::*;
pub use pdf_intake::*;
pub use history_store::*;
pub use document_service::*;

// Re-export pipeline entry points
pub use analysis::{
    classify_document,
    split_text,
    AnalysisOutcome,
    AnalysisPipeline,
    LegalAnalyzer,
    PipelineError,
    PipelineOptions,
    RunState,
    Segment,
    SegmentAnalyzer,
    SegmentError,
    REPORT_SEPARATOR,
};
