// Analysis Module
// Document analysis pipeline organized into specialized submodules:
// - segmenter: fixed-size character windows over the document text
// - classifier: keyword-based document type detection
// - legal_analyzer: prompt templates and per-segment AI calls
// - orchestrator: ordered, fail-fast run over all segments

pub mod segmenter;
pub mod classifier;
pub mod legal_analyzer;
pub mod orchestrator;

pub use segmenter::{expected_segment_count, segments, split_text, Segment, SegmentError, Segments};
pub use classifier::classify_document;
pub use legal_analyzer::{build_user_prompt, LegalAnalyzer, SegmentAnalyzer, LEGAL_SYSTEM_PROMPT};
pub use orchestrator::{
    AnalysisOutcome,
    AnalysisPipeline,
    PipelineError,
    PipelineOptions,
    RunState,
    DEFAULT_MAX_SEGMENT_CHARS,
    REPORT_SEPARATOR,
};
