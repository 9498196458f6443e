use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use folio::Converter;
use folio_render::{project_page, FixedAdvanceMetrics, LayoutConfig, Paginator, Viewport};

const VIEWPORTS: &[(&str, Viewport)] = &[
    ("480x800", Viewport::new(480, 800)),
    ("1072x1448", Viewport::new(1072, 1448)),
];

#[derive(Clone, Debug)]
struct CaseResult {
    input: String,
    case: String,
    iterations: usize,
    min_ns: u128,
    median_ns: u128,
    mean_ns: u128,
    max_ns: u128,
}

/// Chapter markup of `paragraphs` paragraphs with a heading every twenty.
fn synthetic_chapter(paragraphs: usize) -> String {
    let mut out = String::from("<html><head><title>bench</title></head><body>");
    for idx in 0..paragraphs {
        if idx % 20 == 0 {
            out.push_str(&format!("<h2>Section {}</h2>", idx / 20 + 1));
        }
        out.push_str(&format!(
            "<p>Paragraph {idx} opens with <b>bold words</b>, continues with <i>an italic \
             aside that runs <b>into bold</b></i> and closes with enough plain text to \
             wrap across several lines on a narrow e-paper display.</p>"
        ));
    }
    out.push_str("</body></html>");
    out
}

fn run_case<F>(input: &str, case: &str, warmup_iters: usize, measure_iters: usize, mut op: F) -> CaseResult
where
    F: FnMut() -> usize,
{
    for _ in 0..warmup_iters {
        black_box(op());
    }
    let mut samples = Vec::with_capacity(measure_iters);
    for _ in 0..measure_iters {
        let start = Instant::now();
        black_box(op());
        samples.push(start.elapsed().as_nanos());
    }
    samples.sort_unstable();
    let sum: u128 = samples.iter().copied().sum();
    CaseResult {
        input: input.to_string(),
        case: case.to_string(),
        iterations: measure_iters,
        min_ns: samples[0],
        median_ns: samples[samples.len() / 2],
        mean_ns: sum / samples.len() as u128,
        max_ns: samples[samples.len() - 1],
    }
}

fn main() {
    let quick = std::env::args().any(|arg| arg == "--quick");
    let warmup_iters = if quick { 1 } else { 3 };
    let measure_iters = if quick { 5 } else { 20 };

    println!("# folio pagination benchmark");
    println!(
        "# mode={} warmup_iters={} measure_iters={}",
        if quick { "quick" } else { "full" },
        warmup_iters,
        measure_iters
    );

    let converter = Converter::default();
    let paginator = Paginator::new(LayoutConfig::default(), Arc::new(FixedAdvanceMetrics::default()));
    let mut results = Vec::new();

    for paragraphs in [50usize, 500] {
        let markup = synthetic_chapter(paragraphs);
        let input = format!("{}p", paragraphs);
        results.push(run_case(&input, "convert", warmup_iters, measure_iters, || {
            converter.convert(markup.as_bytes()).len()
        }));

        let doc = converter.convert(markup.as_bytes());
        for (name, viewport) in VIEWPORTS {
            results.push(run_case(
                &input,
                &format!("paginate_{}", name),
                warmup_iters,
                measure_iters,
                || paginator.paginate(&doc, *viewport).len(),
            ));
        }

        let pages = paginator.paginate(&doc, VIEWPORTS[0].1);
        results.push(run_case(&input, "project_all_pages", warmup_iters, measure_iters, || {
            pages
                .iter()
                .filter_map(|page| project_page(&doc, *page))
                .map(|view| view.spans.len())
                .sum()
        }));
    }

    println!("input,case,iterations,min_ns,median_ns,mean_ns,max_ns");
    for r in results {
        println!(
            "{},{},{},{},{},{},{}",
            r.input, r.case, r.iterations, r.min_ns, r.median_ns, r.mean_ns, r.max_ns
        );
    }
}
