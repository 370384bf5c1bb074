// PDF object serialization, stream compression and cross-reference table
use crate::domain::error::ExportError;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjId(pub usize);

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0 R", self.0)
    }
}

/// Sequential object writer. Ids are reserved up front so objects can
/// reference each other before they are written.
pub struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<Option<usize>>,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(64 * 1024);
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    pub fn reserve(&mut self) -> ObjId {
        self.offsets.push(None);
        ObjId(self.offsets.len())
    }

    fn begin(&mut self, id: ObjId) {
        self.offsets[id.0 - 1] = Some(self.buf.len());
        self.buf.extend_from_slice(format!("{} 0 obj\n", id.0).as_bytes());
    }

    pub fn object(&mut self, id: ObjId, body: &str) {
        self.begin(id);
        self.buf.extend_from_slice(body.as_bytes());
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    /// Write a Flate-compressed stream. `dict` holds extra dictionary
    /// entries; `/Length` and `/Filter` are added here.
    pub fn stream(&mut self, id: ObjId, dict: &str, data: &[u8]) -> Result<(), ExportError> {
        let compressed = deflate(data)?;
        self.begin(id);
        let header = if dict.is_empty() {
            format!("<< /Length {} /Filter /FlateDecode >>\nstream\n", compressed.len())
        } else {
            format!(
                "<< /Length {} /Filter /FlateDecode {} >>\nstream\n",
                compressed.len(),
                dict
            )
        };
        self.buf.extend_from_slice(header.as_bytes());
        self.buf.extend_from_slice(&compressed);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
        Ok(())
    }

    /// Append the xref table and trailer.
    pub fn finish(mut self, root: ObjId, info: Option<ObjId>) -> Result<Vec<u8>, ExportError> {
        let offsets = self
            .offsets
            .iter()
            .enumerate()
            .map(|(i, o)| o.ok_or_else(|| ExportError::render(format!("PDF object {} was never written", i + 1))))
            .collect::<Result<Vec<_>, _>>()?;

        let xref_start = self.buf.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1);
        for offset in offsets {
            xref.push_str(&format!("{:010} 00000 n \n", offset));
        }
        let info = info.map(|id| format!(" /Info {}", id)).unwrap_or_default();
        xref.push_str(&format!(
            "trailer\n<< /Size {} /Root {}{} >>\nstartxref\n{}\n%%EOF\n",
            self.offsets.len() + 1,
            root,
            info,
            xref_start
        ));
        self.buf.extend_from_slice(xref.as_bytes());
        Ok(self.buf)
    }
}

pub fn deflate(data: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2 + 64), Compression::default());
    encoder.write_all(data).map_err(ExportError::render)?;
    encoder.finish().map_err(ExportError::render)
}

/// Escape a string for a PDF literal `( )` operand. Only for ASCII metadata.
pub fn literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ => out.push('?'),
        }
    }
    out.push(')');
    out
}
