//! Fixture archives shared by the integration tests.
//!
//! Every sample archive holds the same two files so that listing and
//! round-trip checks can run over all formats with one table.

#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use arcsift_core::ArchiveFormat;

pub const HELLO_NAME: &str = "hello.txt";
pub const HELLO: &[u8] = b"hello world\n";
pub const DATA_NAME: &str = "nested/data.bin";

/// 3000 bytes that compress well but are not a single repeated byte.
pub fn data_bin() -> Vec<u8> {
    (0..3000u32).map(|i| (i % 251) as u8 ^ (i / 251) as u8).collect()
}

/// Expected plaintext for an entry name, if it is one of the sample files.
pub fn expected_content(name: &str) -> Option<Vec<u8>> {
    if name.ends_with(HELLO_NAME) {
        Some(HELLO.to_vec())
    } else if name.ends_with("data.bin") {
        Some(data_bin())
    } else {
        None
    }
}

pub fn zip_sample() -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflated =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file(HELLO_NAME, stored).unwrap();
    zip.write_all(HELLO).unwrap();
    zip.start_file(DATA_NAME, deflated).unwrap();
    zip.write_all(&data_bin()).unwrap();
    zip.finish().unwrap().into_inner()
}

/// A ZIP whose only entry is WinZip AES-256 encrypted with `password`.
pub fn zip_aes(password: &str) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .with_aes_encryption(zip::AesMode::Aes256, password);
    zip.start_file(HELLO_NAME, options).unwrap();
    zip.write_all(HELLO).unwrap();
    zip.finish().unwrap().into_inner()
}

pub fn tar_sample() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in [(HELLO_NAME, HELLO.to_vec()), (DATA_NAME, data_bin())] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn xz(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn zstd(data: &[u8]) -> Vec<u8> {
    zstd::encode_all(data, 3).unwrap()
}

/// Packs the sample files with `sevenz-rust2`, optionally AES-256 encrypted.
pub fn sevenz_sample(password: Option<&str>) -> Vec<u8> {
    let temp = tempfile::tempdir().unwrap();
    let src = temp.path().join("src");
    std::fs::create_dir_all(src.join("nested")).unwrap();
    std::fs::write(src.join(HELLO_NAME), HELLO).unwrap();
    std::fs::write(src.join(DATA_NAME), data_bin()).unwrap();

    let dest = temp.path().join("sample.7z");
    match password {
        None => sevenz_rust2::compress_to_path(&src, &dest).unwrap(),
        Some(password) => sevenz_rust2::compress_to_path_encrypted(
            &src,
            &dest,
            sevenz_rust2::Password::from(password),
        )
        .unwrap(),
    }
    std::fs::read(dest).unwrap()
}

fn vint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

fn rar5_header(header_type: u64, flags: u64, fields: &[u8]) -> Vec<u8> {
    let mut body = vint(header_type);
    body.extend(vint(flags));
    body.extend_from_slice(fields);
    let mut checked = vint(body.len() as u64);
    checked.extend(body);
    let mut out = crc32fast::hash(&checked).to_le_bytes().to_vec();
    out.extend(checked);
    out
}

/// A RAR 5.0 archive with the sample files stored uncompressed.
pub fn rar_sample() -> Vec<u8> {
    let mut out = b"Rar!\x1A\x07\x01\x00".to_vec();
    out.extend(rar5_header(1, 0, &vint(0)));
    for (name, data) in [(HELLO_NAME, HELLO.to_vec()), (DATA_NAME, data_bin())] {
        let mut fields = vint(data.len() as u64);
        fields.extend(vint(0x0004)); // CRC present
        fields.extend(vint(data.len() as u64));
        fields.extend(vint(0o644));
        fields.extend_from_slice(&crc32fast::hash(&data).to_le_bytes());
        fields.extend(vint(0)); // stored
        fields.extend(vint(1)); // Unix
        fields.extend(vint(name.len() as u64));
        fields.extend_from_slice(name.as_bytes());
        out.extend(rar5_header(2, 0x0002, &fields));
        out.extend(data);
    }
    out.extend(rar5_header(5, 0, &vint(0)));
    out
}

/// One well-formed sample per supported format.
pub fn all_samples() -> Vec<(ArchiveFormat, &'static str, Vec<u8>)> {
    let tar = tar_sample();
    vec![
        (ArchiveFormat::Zip, "sample.zip", zip_sample()),
        (ArchiveFormat::SevenZ, "sample.7z", sevenz_sample(None)),
        (ArchiveFormat::Rar, "sample.rar", rar_sample()),
        (ArchiveFormat::TarGz, "sample.tar.gz", gzip(&tar)),
        (ArchiveFormat::TarBz2, "sample.tar.bz2", bzip2(&tar)),
        (ArchiveFormat::TarXz, "sample.tar.xz", xz(&tar)),
        (ArchiveFormat::TarZst, "sample.tar.zst", zstd(&tar)),
        (ArchiveFormat::Tar, "sample.tar", tar),
    ]
}

pub fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
