//! In-memory archive builders for unit tests.
//!
//! ZIP and tar fixtures go through the `zip` and `tar` writers; ZipCrypto and
//! RAR fixtures are assembled byte by byte because no writer in the
//! dependency tree produces them. 7z fixtures are written with
//! `sevenz-rust2`'s compress helpers through a temporary directory.
//!
//! # Panics
//!
//! Every helper panics on I/O errors.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Cursor;
use std::io::Write;

use crate::formats::compression::CompressionCodec;
use crate::pipeline::zipcrypto::HEADER_LEN;
use crate::pipeline::zipcrypto::ZipCryptoKeys;

/// Builder for tar fixtures.
///
/// ```ignore
/// let tar_data = TarTestBuilder::new()
///     .add_file("file.txt", b"content")
///     .add_directory("dir/")
///     .add_symlink("link", "file.txt")
///     .build();
/// ```
pub struct TarTestBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl TarTestBuilder {
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
        }
    }

    pub fn add_file(mut self, path: &str, data: &[u8]) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        self.builder.append_data(&mut header, path, data).unwrap();
        self
    }

    pub fn add_directory(mut self, path: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o755);
        header.set_entry_type(tar::EntryType::Directory);
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o777);
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_link_name(target).unwrap();
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    pub fn add_hardlink(mut self, path: &str, target: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Link);
        header.set_link_name(target).unwrap();
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }
}

/// Wraps `data` in the given outer codec.
pub fn compress(codec: CompressionCodec, data: &[u8]) -> Vec<u8> {
    match codec {
        CompressionCodec::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        CompressionCodec::Bzip2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        CompressionCodec::Xz => {
            let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        CompressionCodec::Zstd => zstd::encode_all(data, 3).unwrap(),
    }
}

/// Builder for ZIP fixtures written by the `zip` crate.
pub struct ZipTestBuilder {
    zip: zip::ZipWriter<Cursor<Vec<u8>>>,
}

impl ZipTestBuilder {
    pub fn new() -> Self {
        Self {
            zip: zip::ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Adds a stored file.
    pub fn add_file(self, path: &str, data: &[u8]) -> Self {
        self.add_with(path, data, zip::CompressionMethod::Stored)
    }

    /// Adds a deflated file.
    pub fn add_deflated(self, path: &str, data: &[u8]) -> Self {
        self.add_with(path, data, zip::CompressionMethod::Deflated)
    }

    fn add_with(mut self, path: &str, data: &[u8], method: zip::CompressionMethod) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default()
            .compression_method(method)
            .unix_permissions(0o644);
        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    pub fn add_directory(mut self, path: &str) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default().unix_permissions(0o755);
        self.zip.add_directory(path, options).unwrap();
        self
    }

    /// Adds a deflated file encrypted with WinZip AES-256.
    pub fn add_aes(mut self, path: &str, data: &[u8], password: &str) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .with_aes_encryption(zip::AesMode::Aes256, password);
        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.zip.finish().unwrap().into_inner()
    }
}

/// `note.txt` ("secret payload from info-zip\n"), stored and encrypted by
/// Info-ZIP `zip -P pw123`. The data-descriptor flag is set, so the check
/// byte is the high byte of the DOS time (0x52), not of the CRC (0x8e).
pub const INFOZIP_ZIPCRYPTO: &str = "504b03040a00090000008f526f582292838e290000001d000000080000006e6f74652e747874084208a6df1352964eed0f35fc8435f399308ca33aca37e55f13eac5612fdc21ce978be1083b070b78504b07082292838e290000001d000000504b01021e030a00090000008f526f582292838e290000001d000000080000000000000001000000a481000000006e6f74652e747874504b05060000000001000100360000005f0000000000";

/// A streamed entry (`-`, "streamed secret\n") written by Info-ZIP from
/// stdin with `-P pw123`: ZIP64 local extra, data descriptor and ZIP64
/// end of central directory records.
pub const INFOZIP_ZIPCRYPTO_STREAMED: &str = "504b03042d00090000007ab9505db406ef16ffffffffffffffff010014002d0100100010000000000000001c0000000000000020bc56dad9d39dbb75851ed1f6d24d46655681dd6f578e71352e710e504b0708b406ef161c000000000000001000000000000000504b01021e032d00090000007ab9505db406ef161c000000100000000100000000000000010000008011000000002d504b06062c000000000000001e032d000000000000000000010000000000000001000000000000002f000000000000006700000000000000504b060700000000960000000000000001000000504b050600000000010001002f000000670000000000";

pub fn from_hex(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

/// Builds a single-entry ZIP whose stored entry is ZipCrypto-encrypted.
pub fn zipcrypto_archive(name: &str, data: &[u8], password: &str) -> Vec<u8> {
    let crc = crc32fast::hash(data);
    let mut keys = ZipCryptoKeys::new(password.as_bytes());
    let mut header = [0x5Au8; HEADER_LEN];
    header[HEADER_LEN - 1] = crc.to_be_bytes()[0];
    let payload: Vec<u8> = header
        .iter()
        .chain(data)
        .map(|&b| keys.encrypt_byte(b))
        .collect();

    let name = name.as_bytes();
    let name_len = u16::try_from(name.len()).unwrap();
    let packed = u32::try_from(payload.len()).unwrap();
    let unpacked = u32::try_from(data.len()).unwrap();

    let mut out = Vec::new();
    out.extend_from_slice(b"PK\x03\x04");
    out.extend_from_slice(&20u16.to_le_bytes()); // version needed
    out.extend_from_slice(&1u16.to_le_bytes()); // flags: encrypted
    out.extend_from_slice(&0u16.to_le_bytes()); // stored
    out.extend_from_slice(&0u32.to_le_bytes()); // DOS time and date
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&packed.to_le_bytes());
    out.extend_from_slice(&unpacked.to_le_bytes());
    out.extend_from_slice(&name_len.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&payload);

    let directory_offset = u32::try_from(out.len()).unwrap();
    out.extend_from_slice(b"PK\x01\x02");
    out.extend_from_slice(&20u16.to_le_bytes()); // version made by
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&packed.to_le_bytes());
    out.extend_from_slice(&unpacked.to_le_bytes());
    out.extend_from_slice(&name_len.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // extra
    out.extend_from_slice(&0u16.to_le_bytes()); // comment
    out.extend_from_slice(&0u16.to_le_bytes()); // disk
    out.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
    out.extend_from_slice(&0u32.to_le_bytes()); // external attributes
    out.extend_from_slice(&0u32.to_le_bytes()); // local header offset
    out.extend_from_slice(name);
    let directory_size = u32::try_from(out.len()).unwrap() - directory_offset;

    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&directory_size.to_le_bytes());
    out.extend_from_slice(&directory_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

/// Writes `files` into a temporary tree and packs it with `sevenz-rust2`.
///
/// With a password the archive is AES-256 encrypted.
pub fn sevenz_archive(files: &[(&str, &[u8])], password: Option<&str>) -> Vec<u8> {
    let temp = tempfile::tempdir().unwrap();
    let src = temp.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    for (name, data) in files {
        let path = src.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, data).unwrap();
    }

    let dest = temp.path().join("fixture.7z");
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

/// Builder for RAR 5.0 fixtures.
pub struct Rar5Builder {
    out: Vec<u8>,
}

impl Rar5Builder {
    const HEAD_MAIN: u64 = 1;
    const HEAD_FILE: u64 = 2;
    const HEAD_CRYPT: u64 = 4;
    const HEAD_END: u64 = 5;

    pub fn new() -> Self {
        let mut out = b"Rar!\x1A\x07\x01\x00".to_vec();
        out.extend(Self::header(Self::HEAD_MAIN, 0, &[], &vint(0)));
        Self { out }
    }

    /// Encodes one header: CRC-32, size, then the body.
    fn header(header_type: u64, flags: u64, extra: &[u8], fields: &[u8]) -> Vec<u8> {
        let mut body = vint(header_type);
        body.extend(vint(flags));
        if !extra.is_empty() {
            body.extend(vint(extra.len() as u64));
        }
        body.extend_from_slice(fields);
        body.extend_from_slice(extra);

        let mut checked = vint(body.len() as u64);
        checked.extend(body);
        let mut out = crc32fast::hash(&checked).to_le_bytes().to_vec();
        out.extend(checked);
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn file(
        mut self,
        name: &str,
        file_flags: u64,
        level: u64,
        unpacked: u64,
        data: &[u8],
        extra: &[u8],
        split: bool,
    ) -> Self {
        let mut header_flags = 0x0002; // data area
        if !extra.is_empty() {
            header_flags |= 0x0001;
        }
        if split {
            header_flags |= 0x0010;
        }

        let mut fields = vint(data.len() as u64);
        fields.extend(vint(file_flags | 0x0004));
        fields.extend(vint(unpacked));
        fields.extend(vint(0o644)); // attributes
        fields.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        fields.extend(vint(level << 7));
        fields.extend(vint(1)); // host OS: Unix
        fields.extend(vint(name.len() as u64));
        fields.extend_from_slice(name.as_bytes());

        self.out
            .extend(Self::header(Self::HEAD_FILE, header_flags, extra, &fields));
        self.out.extend_from_slice(data);
        self
    }

    pub fn add_stored(self, name: &str, data: &[u8]) -> Self {
        self.file(name, 0, 0, data.len() as u64, data, &[], false)
    }

    pub fn add_directory(self, name: &str) -> Self {
        self.file(name, 0x0001, 0, 0, &[], &[], false)
    }

    pub fn add_compressed(self, name: &str, level: u64, unpacked: u64, packed: &[u8]) -> Self {
        self.file(name, 0, level, unpacked, packed, &[], false)
    }

    pub fn add_encrypted(self, name: &str, data: &[u8]) -> Self {
        // Encryption record: type, version, flags, KDF count, salt, IV.
        let mut record = vint(0x01);
        record.extend(vint(0));
        record.extend(vint(0));
        record.push(15);
        record.extend_from_slice(&[0x11; 16]);
        record.extend_from_slice(&[0x22; 16]);
        let mut extra = vint(record.len() as u64);
        extra.extend(record);
        self.file(name, 0, 0, data.len() as u64, data, &extra, false)
    }

    /// Adds a redirection entry (1 Unix symlink, 4 hard link) to `target`.
    pub fn add_link(self, name: &str, redirection: u64, target: &str) -> Self {
        let mut record = vint(0x05);
        record.extend(vint(redirection));
        record.extend(vint(0)); // flags
        record.extend(vint(target.len() as u64));
        record.extend_from_slice(target.as_bytes());
        let mut extra = vint(record.len() as u64);
        extra.extend(record);
        self.file(name, 0, 0, 0, &[], &extra, false)
    }

    pub fn add_split(self, name: &str, data: &[u8]) -> Self {
        self.file(name, 0, 0, data.len() as u64 * 2, data, &[], true)
    }

    /// Replaces everything after the signature with an encryption header.
    pub fn encrypted_headers(mut self) -> Self {
        self.out.truncate(8);
        let mut fields = vint(0); // version
        fields.extend(vint(0)); // flags
        fields.push(15);
        fields.extend_from_slice(&[0x33; 16]);
        self.out.extend(Self::header(Self::HEAD_CRYPT, 0, &[], &fields));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.out.extend(Self::header(Self::HEAD_END, 0, &[], &vint(0)));
        self.out
    }
}

/// Builder for RAR 1.5-4.x fixtures.
pub struct Rar4Builder {
    out: Vec<u8>,
}

impl Rar4Builder {
    pub fn new() -> Self {
        let mut out = b"Rar!\x1A\x07\x00".to_vec();
        out.extend(Self::block(0x73, 0, &[0u8; 6]));
        Self { out }
    }

    /// Encodes one block header: CRC-16, type, flags, size, then the fields.
    fn block(block_type: u8, flags: u16, fields: &[u8]) -> Vec<u8> {
        let size = u16::try_from(7 + fields.len()).unwrap();
        let mut covered = vec![block_type];
        covered.extend_from_slice(&flags.to_le_bytes());
        covered.extend_from_slice(&size.to_le_bytes());
        covered.extend_from_slice(fields);

        let crc = crc32fast::hash(&covered).to_le_bytes();
        let mut out = vec![crc[0], crc[1]];
        out.extend(covered);
        out
    }

    fn file(mut self, flags: u16, name: &[u8], method: u8, unpacked: u32, attributes: u32, data: &[u8]) -> Self {
        let mut fields = Vec::new();
        fields.extend_from_slice(&u32::try_from(data.len()).unwrap().to_le_bytes());
        fields.extend_from_slice(&unpacked.to_le_bytes());
        fields.push(2); // host OS: Win32
        fields.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        fields.extend_from_slice(&0u32.to_le_bytes()); // DOS time
        fields.push(29); // version to extract
        fields.push(method);
        fields.extend_from_slice(&u16::try_from(name.len()).unwrap().to_le_bytes());
        fields.extend_from_slice(&attributes.to_le_bytes());
        fields.extend_from_slice(name);

        self.out.extend(Self::block(0x74, flags | 0x8000, &fields));
        self.out.extend_from_slice(data);
        self
    }

    pub fn add_stored(self, name: &str, data: &[u8]) -> Self {
        let len = u32::try_from(data.len()).unwrap();
        self.file(0, name.as_bytes(), 0x30, len, 0x20, data)
    }

    pub fn add_directory(self, name: &str) -> Self {
        self.file(0x00E0, name.as_bytes(), 0x30, 0, 0x10, &[])
    }

    pub fn add_compressed(self, name: &str, level: u8, unpacked: u32, packed: &[u8]) -> Self {
        self.file(0, name.as_bytes(), 0x30 + level, unpacked, 0x20, packed)
    }

    pub fn add_encrypted(self, name: &str, data: &[u8]) -> Self {
        let len = u32::try_from(data.len()).unwrap();
        self.file(0x0004, name.as_bytes(), 0x30, len, 0x20, data)
    }

    /// Adds a stored file whose name field carries an encoded Unicode tail.
    pub fn add_unicode_name(self, name: &str, tail: &[u8], data: &[u8]) -> Self {
        let mut raw = name.as_bytes().to_vec();
        raw.push(0);
        raw.extend_from_slice(tail);
        let len = u32::try_from(data.len()).unwrap();
        self.file(0x0200, &raw, 0x30, len, 0x20, data)
    }

    /// Rebuilds the main header with the encrypted-headers flag.
    pub fn encrypted_headers(mut self) -> Self {
        self.out.truncate(7);
        self.out.extend(Self::block(0x73, 0x0080, &[0u8; 6]));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.out.extend(Self::block(0x7B, 0x4000, &[]));
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vint_encoding() {
        assert_eq!(vint(0), [0]);
        assert_eq!(vint(0x7F), [0x7F]);
        assert_eq!(vint(0x80), [0x80, 0x01]);
    }

    #[test]
    fn test_zipcrypto_fixture_layout() {
        let data = zipcrypto_archive("a.txt", b"abc", "pw");
        assert!(data.starts_with(b"PK\x03\x04"));
        assert_eq!(&data[data.len() - 22..data.len() - 18], b"PK\x05\x06");
    }
}
