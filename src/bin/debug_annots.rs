use pdf_highlights::highlights::highlight_text;
use pdf_highlights::PdfDocument;
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_annots <pdf_path>");
        std::process::exit(1);
    }

    let doc = PdfDocument::load(&args[1]).expect("Failed to load PDF");

    for page in doc.pages() {
        let annots = page.annotations().expect("Failed to read annotations");
        if annots.is_empty() {
            continue;
        }
        println!("=== PAGE {} ({} annotations) ===", page.index() + 1, annots.len());

        let text = page.text().expect("Failed to extract text");
        for annot in &annots {
            let code = annot
                .kind
                .type_code()
                .map_or("-".to_string(), |c| c.to_string());
            let vertices = annot.vertices.as_ref().map_or(0, Vec::len);
            println!(
                "  type={:>2} subtype={:<14} vertices={:3} text={:?}",
                code,
                annot.subtype,
                vertices,
                highlight_text(&text, annot)
            );
        }
        println!();
    }
}
