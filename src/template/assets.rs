// ABOUTME: Random binary asset generators for the randImage, randPdf and randZip functions
// ABOUTME: Produces small but well-formed image, PDF and compressed archive payloads

use flate2::write::GzEncoder;
use flate2::Compression;
use rand::RngCore;
use std::io;

use super::random::random_alphanumeric;

const IMAGE_SIZE: usize = 16;
const ARCHIVE_ENTRY: &str = "random.txt";

/// Binary PPM (P6) image filled with random pixels.
pub fn random_image() -> Vec<u8> {
    let header = format!("P6\n{} {}\n255\n", IMAGE_SIZE, IMAGE_SIZE);
    let mut pixels = vec![0u8; IMAGE_SIZE * IMAGE_SIZE * 3];
    rand::thread_rng().fill_bytes(&mut pixels);

    let mut image = header.into_bytes();
    image.extend_from_slice(&pixels);
    image
}

/// Single page PDF showing a random line of text.
pub fn random_pdf() -> Vec<u8> {
    let text = random_alphanumeric(24);
    let stream = format!("BT /F1 12 Tf 20 50 Td ({}) Tj ET", text);

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 300 100] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut document = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(document.len());
        document.push_str(&format!("{} 0 obj\n{}\nendobj\n", index + 1, body));
    }

    let xref_offset = document.len();
    document.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        document.push_str(&format!("{:010} 00000 n \n", offset));
    }
    document.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));

    document.into_bytes()
}

/// Gzip compressed tar archive holding one random text entry.
pub fn random_archive() -> io::Result<Vec<u8>> {
    let content = random_alphanumeric(64);

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, ARCHIVE_ENTRY, content.as_bytes())?;

    builder.into_inner()?.finish()
}
