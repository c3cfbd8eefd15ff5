// src/packages/deb.rs

//! Debian package extraction
//!
//! .deb packages are AR archives holding `debian-binary`, a control tarball
//! and a data tarball. Only the data tarball is unpacked; it holds the files
//! that end up under the install root.

use super::Extractor;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;

/// Payload member names, in the order they are looked for
const DATA_MEMBERS: [&str; 4] = ["data.tar.gz", "data.tar.xz", "data.tar.zst", "data.tar"];

/// Extracts the data payload of a .deb archive
#[derive(Debug, Default, Clone, Copy)]
pub struct DebExtractor;

impl DebExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Find the data tarball member in the AR container
    fn data_member(archive: &[u8]) -> std::result::Result<(String, Vec<u8>), String> {
        let mut ar = ar::Archive::new(archive);

        while let Some(entry) = ar.next_entry() {
            let mut entry = entry.map_err(|e| format!("Failed to read AR entry: {}", e))?;

            let entry_name = String::from_utf8_lossy(entry.header().identifier())
                .trim_end_matches('/')
                .to_string();

            if DATA_MEMBERS.contains(&entry_name.as_str()) {
                let mut content = Vec::new();
                entry
                    .read_to_end(&mut content)
                    .map_err(|e| format!("Failed to read {}: {}", entry_name, e))?;
                return Ok((entry_name, content));
            }
        }

        Err("No data.tar member in DEB archive".to_string())
    }

    /// Wrap the tarball in the decoder its extension calls for
    fn decoder<'a>(member: &str, data: &'a [u8]) -> std::result::Result<Box<dyn Read + 'a>, String> {
        let reader: Box<dyn Read + 'a> = if member.ends_with(".gz") {
            Box::new(GzDecoder::new(data))
        } else if member.ends_with(".xz") {
            Box::new(XzDecoder::new(data))
        } else if member.ends_with(".zst") {
            Box::new(
                zstd::Decoder::new(data)
                    .map_err(|e| format!("Failed to create zstd decoder: {}", e))?,
            )
        } else {
            Box::new(data)
        };
        Ok(reader)
    }

    /// Unpack the data tarball, returning the number of non-directory entries
    fn unpack(member: &str, data: &[u8], dest: &Path) -> std::result::Result<usize, String> {
        let mut archive = Archive::new(Self::decoder(member, data)?);

        let mut unpacked = 0;
        for entry in archive
            .entries()
            .map_err(|e| format!("Failed to read {}: {}", member, e))?
        {
            let mut entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
            let is_dir = entry.header().entry_type().is_dir();

            // unpack_in refuses paths escaping `dest` and reports false
            let inside = entry
                .unpack_in(dest)
                .map_err(|e| format!("Failed to unpack entry: {}", e))?;
            if inside && !is_dir {
                unpacked += 1;
            }
        }

        Ok(unpacked)
    }
}

impl Extractor for DebExtractor {
    fn extract(&self, package: &str, archive: &[u8], dest: &Path) -> Result<()> {
        debug!("Extracting {} ({} bytes) into {}", package, archive.len(), dest.display());

        let failed = |reason: String| Error::Extraction {
            package: package.to_string(),
            reason,
        };

        let (member, data) = Self::data_member(archive).map_err(failed)?;
        let unpacked = Self::unpack(&member, &data, dest).map_err(failed)?;

        if unpacked == 0 {
            return Err(failed(format!("{} contains no files", member)));
        }

        debug!("Extracted {} entries from {}", unpacked, member);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;

    fn tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn deb(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut builder = ar::Builder::new(&mut out);
            for (name, data) in members {
                let header = ar::Header::new(name.as_bytes().to_vec(), data.len() as u64);
                builder.append(&header, data.as_slice()).unwrap();
            }
        }
        out
    }

    #[test]
    fn test_extract_gz_payload() {
        let data = gzip(&tarball(&[
            ("./usr/bin/hello", &b"#!/bin/sh\necho hi\n"[..]),
            ("./usr/share/doc/hello/README", &b"readme"[..]),
        ]));
        let archive = deb(&[
            ("debian-binary", b"2.0\n".to_vec()),
            ("control.tar.gz", gzip(&tarball(&[("./control", &b"Package: hello\n"[..])]))),
            ("data.tar.gz", data),
        ]);

        let dest = tempdir().unwrap();
        DebExtractor::new().extract("hello", &archive, dest.path()).unwrap();

        assert_eq!(
            fs::read(dest.path().join("usr/bin/hello")).unwrap(),
            b"#!/bin/sh\necho hi\n"
        );
        assert!(dest.path().join("usr/share/doc/hello/README").exists());
        // Control files are not part of the payload
        assert!(!dest.path().join("control").exists());
    }

    #[test]
    fn test_extract_uncompressed_payload() {
        let archive = deb(&[
            ("debian-binary", b"2.0\n".to_vec()),
            ("data.tar", tarball(&[("etc/hello.conf", &b"x=1\n"[..])])),
        ]);

        let dest = tempdir().unwrap();
        DebExtractor::new().extract("hello", &archive, dest.path()).unwrap();
        assert!(dest.path().join("etc/hello.conf").exists());
    }

    #[test]
    fn test_missing_payload() {
        let archive = deb(&[("debian-binary", b"2.0\n".to_vec())]);
        let dest = tempdir().unwrap();

        let result = DebExtractor::new().extract("broken", &archive, dest.path());
        assert!(matches!(result, Err(Error::Extraction { package, .. }) if package == "broken"));
    }

    #[test]
    fn test_empty_payload() {
        let archive = deb(&[("data.tar.gz", gzip(&tarball(&[])))]);
        let dest = tempdir().unwrap();

        let result = DebExtractor::new().extract("empty", &archive, dest.path());
        assert!(matches!(result, Err(Error::Extraction { .. })));
    }

    #[test]
    fn test_not_an_archive() {
        let dest = tempdir().unwrap();
        let result = DebExtractor::new().extract("junk", b"definitely not a deb", dest.path());
        assert!(matches!(result, Err(Error::Extraction { .. })));
    }
}
