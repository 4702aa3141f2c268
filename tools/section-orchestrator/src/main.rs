use std::env;
use std::path::PathBuf;

use compose_service::generator::ErnieGenerator;
use compose_service::ComposeConfig;
use docx_splitter::driver::{merge_docx_into, SplitOptions};
use docx_splitter::numbering::reconstruct_counter;
use docx_splitter::reader_docx::read_docx_to_blocks;
use docx_splitter::writer_docx::DocxWriter;
use docx_splitter::{split_docx_file, EmitOptions};
use section_model::SectionCounter;

fn print_usage() {
    eprintln!(
        "Usage:\n\
         section-orchestrator split INPUT.docx [--out DIR] [--font NAME] [--max-width CM]\n\
         section-orchestrator merge SOURCE.docx DEST.docx [--major N] [--font NAME] [--max-width CM]\n\
         section-orchestrator compose [--sheet FILE] [--doc FILE] [--sources DIR] [--major N]\n\
                                      [--no-point-answer] [--mark-keywords] [--font NAME] [--max-width CM]\n\
         \n\
         split writes one numbered file per heading section to DIR (default: sections/).\n\
         merge appends SOURCE's content to DEST, continuing DEST's section numbering.\n\
         compose walks the requirement sheet (default: 需求对应表.xlsx), generates titles and\n\
         answers via ERNIE (set ERNIE_API_KEY / ERNIE_SECRET_KEY) and builds up the proposal\n\
         document (default: 标书内容.docx) from {{key}}-*.docx source files in --sources.\n"
    );
}

fn emit_options_from_args(args: &[String]) -> EmitOptions {
    let mut opts = EmitOptions::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--font" => { if i + 1 < args.len() { opts.font = args[i + 1].clone(); i += 2; } else { i += 1; } }
            "--max-width" => { if i + 1 < args.len() { opts.max_width_cm = args[i + 1].parse().unwrap_or(opts.max_width_cm); i += 2; } else { i += 1; } }
            _ => { i += 1; }
        }
    }
    opts
}

fn do_split(mut tail: Vec<String>) -> Result<(), String> {
    if tail.is_empty() || tail[0].starts_with('-') {
        return Err("split requires an input file".into());
    }
    let input = tail.remove(0);

    let mut out_dir = PathBuf::from("sections");
    let mut i = 0;
    while i < tail.len() {
        match tail[i].as_str() {
            "--out" => { if i + 1 < tail.len() { out_dir = PathBuf::from(&tail[i + 1]); i += 2; } else { return Err("--out requires dir".into()); } }
            _ => { i += 1; }
        }
    }

    let opts = SplitOptions { out_dir, emit: emit_options_from_args(&tail) };
    let outcome = split_docx_file(&input, &opts).map_err(|e| e.to_string())?;
    println!("Wrote {} section file(s):", outcome.files.len());
    for file in &outcome.files {
        println!("  {}", file.display());
    }
    Ok(())
}

fn do_merge(mut tail: Vec<String>) -> Result<(), String> {
    if tail.len() < 2 || tail[0].starts_with('-') || tail[1].starts_with('-') {
        return Err("merge requires SOURCE and DEST files".into());
    }
    let source = tail.remove(0);
    let dest = tail.remove(0);

    let mut major: Option<u32> = None;
    let mut i = 0;
    while i < tail.len() {
        match tail[i].as_str() {
            "--major" => { if i + 1 < tail.len() { major = tail[i + 1].parse().ok(); i += 2; } else { return Err("--major requires number".into()); } }
            _ => { i += 1; }
        }
    }

    let mut counter = match major {
        Some(m) => SectionCounter::with_major(m),
        None => {
            let dest_blocks = read_docx_to_blocks(&dest).map_err(|e| e.to_string())?;
            reconstruct_counter(&dest_blocks).unwrap_or_else(|| SectionCounter::with_major(2))
        }
    };

    let mut writer = DocxWriter::open(&dest).map_err(|e| e.to_string())?;
    let emit = emit_options_from_args(&tail);
    let sections = merge_docx_into(&source, &mut writer, &mut counter, &emit).map_err(|e| e.to_string())?;
    writer.save(&dest).map_err(|e| e.to_string())?;
    println!("Merged {sections} section(s) into {dest}; counter now {}", counter.trimmed_label());
    Ok(())
}

fn do_compose(tail: Vec<String>) -> Result<(), String> {
    let mut config = ComposeConfig { emit: emit_options_from_args(&tail), ..Default::default() };

    let mut i = 0;
    while i < tail.len() {
        match tail[i].as_str() {
            "--sheet" => { if i + 1 < tail.len() { config.sheet_path = tail[i + 1].clone(); i += 2; } else { return Err("--sheet requires file".into()); } }
            "--doc" => { if i + 1 < tail.len() { config.doc_path = tail[i + 1].clone(); i += 2; } else { return Err("--doc requires file".into()); } }
            "--sources" => { if i + 1 < tail.len() { config.source_dir = PathBuf::from(&tail[i + 1]); i += 2; } else { return Err("--sources requires dir".into()); } }
            "--major" => { if i + 1 < tail.len() { config.start_major = tail[i + 1].parse().unwrap_or(config.start_major); i += 2; } else { return Err("--major requires number".into()); } }
            "--no-point-answer" => { config.point_answer = false; i += 1; }
            "--mark-keywords" => { config.mark_keywords = true; i += 1; }
            _ => { i += 1; }
        }
    }

    let generator = ErnieGenerator::from_env().map_err(|e| e.to_string())?;
    let report = compose_service::run_compose(&config, &generator).map_err(|e| e.to_string())?;
    println!(
        "Compose finished: {} row(s), {} section(s) added, {} document(s) merged, {} solution(s) generated",
        report.rows_processed, report.sections_added, report.documents_merged, report.solutions_generated
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { print_usage(); return; }
    let cmd = args.remove(0);
    let res = match cmd.as_str() {
        "split" => do_split(args),
        "merge" => do_merge(args),
        "compose" => do_compose(args),
        _ => { print_usage(); return; }
    };
    if let Err(err) = res {
        eprintln!("Error: {}", err);
        print_usage();
    }
}
