use legally_lib::services::analysis::{classify_document, split_text, DEFAULT_MAX_SEGMENT_CHARS};
use legally_lib::services::text_processor::preview;
use legally_lib::services::{extract_document_text, PdfExtractText};
use serde::Serialize;

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  cargo run --bin split_pdf -- <path.pdf> [--max-chars <n>] [--show <n>] [--full] [--out <json_path>]\n\nNotes:\n  - Offline: extracts, normalizes and segments the text without calling the model.\n  - `--full` keeps segment text in the JSON output (previews only otherwise)."
        );
        return Ok(());
    }

    let path = args[1].clone();
    let max_chars: usize = parse_arg_value(&args, "--max-chars")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_MAX_SEGMENT_CHARS);
    let show_n: usize = parse_arg_value(&args, "--show")
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);
    let full = has_flag(&args, "--full");
    let out_path = parse_arg_value(&args, "--out");

    let bytes = std::fs::read(&path).map_err(|e| format!("read file failed: {}", e))?;
    let file_name = std::path::Path::new(&path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "input.pdf".to_string());

    let text = extract_document_text(&PdfExtractText, &file_name, &bytes)
        .map_err(|e| format!("{} ({})", e, e.code()))?;
    let document_type = classify_document(text.as_str());
    let segments = split_text(text.as_str(), max_chars).map_err(|e| e.to_string())?;

    println!("File: {}", path);
    println!("Extracted: {} chars ({} bytes)", text.char_count(), text.as_str().len());
    println!("Type: {}", document_type);
    println!("Max chars per segment: {}", max_chars);
    println!();

    println!("Segments: {}", segments.len());
    for s in segments.iter().take(show_n) {
        println!(
            "[P{:03}] chars=[{},{}) len={}  {}",
            s.index + 1,
            s.char_start,
            s.char_start + s.char_len,
            s.char_len,
            preview(&s.text, 140)
        );
    }
    if segments.len() > show_n {
        println!("... ({} more segments)", segments.len() - show_n);
    }

    if let Some(out_path) = out_path {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct SegmentOut {
            index: usize,
            char_start: usize,
            char_len: usize,
            text: String,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Output {
            file: String,
            document_type: legally_lib::models::DocumentType,
            max_chars: usize,
            extracted_chars: usize,
            extracted_bytes: usize,
            segments: Vec<SegmentOut>,
        }

        let out = Output {
            file: path.clone(),
            document_type,
            max_chars,
            extracted_chars: text.char_count(),
            extracted_bytes: text.as_str().len(),
            segments: segments
                .into_iter()
                .map(|s| SegmentOut {
                    index: s.index,
                    char_start: s.char_start,
                    char_len: s.char_len,
                    text: if full { s.text } else { preview(&s.text, 200) },
                })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&out).map_err(|e| e.to_string())?;
        std::fs::write(&out_path, json).map_err(|e| format!("write out failed: {}", e))?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
