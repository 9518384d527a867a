//! Minimal PDF 1.4 writer: A4 pages, Helvetica text lines, automatic page breaks.

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;

/// Advance widths of ASCII 32..=126 in 1/1000 em, from the Helvetica AFM.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Same range for Helvetica-Bold.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[derive(Debug, Clone)]
struct Line {
    text: String,
    size: f32,
    bold: bool,
}

#[derive(Debug, Default)]
pub struct PdfBuilder {
    title: String,
    lines: Vec<Line>,
}

impl PdfBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn heading(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(text.into(), 16.0, true)
    }

    pub fn subheading(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(text.into(), 12.0, true)
    }

    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(text.into(), 10.0, false)
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(Line {
            text: String::new(),
            size: 10.0,
            bold: false,
        });
        self
    }

    fn push(&mut self, text: String, size: f32, bold: bool) -> &mut Self {
        let max_width = ((PAGE_WIDTH - 2.0 * MARGIN) * 1000.0 / size) as u32;
        for chunk in wrap(&text, max_width, bold) {
            self.lines.push(Line {
                text: chunk,
                size,
                bold,
            });
        }
        self
    }

    fn paginate(&self) -> Vec<Vec<u8>> {
        let mut pages = Vec::new();
        let mut content = Vec::new();
        let mut y = PAGE_HEIGHT - MARGIN;

        for line in &self.lines {
            let leading = line.size * 1.4;
            if y - leading < MARGIN && !content.is_empty() {
                pages.push(finish_stream(content));
                content = Vec::new();
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= leading;
            if line.text.is_empty() {
                continue;
            }
            let font = if line.bold { "F2" } else { "F1" };
            content.extend_from_slice(
                format!("/{} {} Tf\n1 0 0 1 {} {:.1} Tm\n(", font, line.size, MARGIN, y).as_bytes(),
            );
            content.extend_from_slice(&encode_text(&line.text));
            content.extend_from_slice(b") Tj\n");
        }

        if !content.is_empty() || pages.is_empty() {
            pages.push(finish_stream(content));
        }
        pages
    }

    /// Serializes the document. Object layout: 1 catalog, 2 page tree,
    /// 3-4 fonts, 5 info, then one page object and one content stream per page.
    pub fn finish(&self) -> Vec<u8> {
        let pages = self.paginate();
        let mut out: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = Vec::new();

        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        let kids: Vec<String> = (0..pages.len())
            .map(|i| format!("{} 0 R", 6 + 2 * i))
            .collect();

        write_object(&mut out, &mut offsets, b"<< /Type /Catalog /Pages 2 0 R >>");
        write_object(
            &mut out,
            &mut offsets,
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                pages.len()
            )
            .as_bytes(),
        );
        write_object(
            &mut out,
            &mut offsets,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        );
        write_object(
            &mut out,
            &mut offsets,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
        );
        let mut info = b"<< /Title (".to_vec();
        info.extend_from_slice(&encode_text(&self.title));
        info.extend_from_slice(b") /Producer (taller) >>");
        write_object(&mut out, &mut offsets, &info);

        for (i, stream) in pages.iter().enumerate() {
            let content_id = 7 + 2 * i;
            write_object(
                &mut out,
                &mut offsets,
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                    PAGE_WIDTH, PAGE_HEIGHT, content_id
                )
                .as_bytes(),
            );
            let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
            body.extend_from_slice(stream);
            body.extend_from_slice(b"\nendstream");
            write_object(&mut out, &mut offsets, &body);
        }

        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in &offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
                offsets.len() + 1,
                xref_offset
            )
            .as_bytes(),
        );
        out
    }
}

fn write_object(out: &mut Vec<u8>, offsets: &mut Vec<usize>, body: &[u8]) {
    offsets.push(out.len());
    out.extend_from_slice(format!("{} 0 obj\n", offsets.len()).as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
}

fn finish_stream(content: Vec<u8>) -> Vec<u8> {
    let mut stream = b"BT\n".to_vec();
    stream.extend_from_slice(&content);
    stream.extend_from_slice(b"ET");
    stream
}

/// Accented letters take the width of their base letter.
fn base_letter(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ñ' => 'N',
        'Ç' => 'C',
        other => other,
    }
}

/// Width of one glyph in 1/1000 em.
fn glyph_width(ch: char, bold: bool) -> u32 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    match base_letter(ch) as u32 {
        code @ 32..=126 => u32::from(table[(code - 32) as usize]),
        _ => 556,
    }
}

fn text_width(text: &str, bold: bool) -> u32 {
    text.chars().map(|ch| glyph_width(ch, bold)).sum()
}

/// Byte for `ch` in WinAnsiEncoding (cp1252), if the font can show it.
fn win_ansi(ch: char) -> Option<u8> {
    let byte = match ch {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        c if (0x20..0x7F).contains(&(c as u32)) || (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
        _ => return None,
    };
    Some(byte)
}

/// WinAnsi bytes with PDF string escapes; characters the font lacks become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                bytes.push(b'\\');
                bytes.push(ch as u8);
            }
            '\n' | '\r' | '\t' => bytes.push(b' '),
            c if (c as u32) < 0x20 => {}
            c => bytes.push(win_ansi(c).unwrap_or(b'?')),
        }
    }
    bytes
}

/// Splits `text` on spaces into lines no wider than `max_width` (1/1000 em units),
/// cutting words that don't fit on a line of their own.
fn wrap(text: &str, max_width: u32, bold: bool) -> Vec<String> {
    if text_width(text, bold) <= max_width {
        return vec![text.to_string()];
    }

    let space = glyph_width(' ', bold);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for word in text.split(' ') {
        let word_width = text_width(word, bold);
        if !current.is_empty() && current_width + space + word_width > max_width {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        if word_width > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            for ch in word.chars() {
                let w = glyph_width(ch, bold);
                if !current.is_empty() && current_width + w > max_width {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(ch);
                current_width += w;
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
            current_width += space;
        }
        current.push_str(word);
        current_width += word_width;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn produces_a_complete_single_page_document() {
        let mut pdf = PdfBuilder::new("Reporte");
        pdf.heading("Reporte de clientes").line("Total: 3");
        let bytes = pdf.finish();
        let text = as_text(&bytes);

        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("(Reporte de clientes) Tj"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let mut pdf = PdfBuilder::new("x");
        pdf.line("hola");
        let bytes = pdf.finish();
        let xref_at = bytes
            .windows(5)
            .position(|w| w == b"xref\n")
            .unwrap();
        let table = std::str::from_utf8(&bytes[xref_at..]).unwrap();
        let first_entry = table.lines().nth(3).unwrap();
        let offset: usize = first_entry[..10].parse().unwrap();
        assert!(bytes[offset..].starts_with(b"1 0 obj"));
    }

    #[test]
    fn long_documents_break_into_pages() {
        let mut pdf = PdfBuilder::new("largo");
        for i in 0..200 {
            pdf.line(format!("fila {}", i));
        }
        let text = as_text(&pdf.finish());
        assert!(!text.contains("/Count 1 "));
        assert!(text.contains("/Type /Pages /Kids [6 0 R 8 0 R"));
    }

    #[test]
    fn encodes_win_ansi_and_escapes_delimiters() {
        assert_eq!(encode_text("a(b)c\\"), b"a\\(b\\)c\\\\".to_vec());
        assert_eq!(encode_text("ñ"), vec![0xF1]);
        assert_eq!(encode_text("€ – “ok”"), vec![0x80, b' ', 0x96, b' ', 0x93, b'o', b'k', 0x94]);
        assert_eq!(encode_text("\u{0085}漢"), b"??".to_vec());
    }

    #[test]
    fn measures_with_font_metrics() {
        assert_eq!(text_width("iiii", false), 4 * 222);
        assert_eq!(text_width("MMMM", false), 4 * 833);
        assert!(text_width("Mecánico", true) > text_width("Mecánico", false));
        assert_eq!(glyph_width('á', false), glyph_width('a', false));
    }

    #[test]
    fn wraps_on_word_boundaries_by_width() {
        // "uno dos" is 3558 units wide, adding " tres" would make it 5503.
        let lines = wrap("uno dos tres cuatro", 556 * 7 + 278, false);
        assert_eq!(lines, vec!["uno dos", "tres", "cuatro"]);
        assert_eq!(wrap("abcdeghnop", 556 * 4, false), vec!["abcd", "eghn", "op"]);
        // Narrow glyphs pack more per line than wide ones.
        assert_eq!(wrap("iiiiii WWWWWW", 222 * 6, false).len(), 1 + 6);
    }
}
