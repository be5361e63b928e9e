// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Timeline body rows.
//!
//! A timeline body is the pipe-delimited "bodyfile" format: one entry per
//! line with the columns
//! `md5|path|inode|mode|uid|gid|size|atime|mtime|ctime|crtime`.

use std::borrow::Cow;

use crate::error::{Error, Result};

pub const FIELD_COUNT: usize = 11;

/// Windows-1251 code points for bytes `0x80..=0xBF`; `0x98` is unassigned.
/// Bytes `0xC0..=0xFF` map onto `U+0410..=U+044F`.
const CP1251_HIGH: [Option<char>; 64] = [
    Some('\u{0402}'), Some('\u{0403}'), Some('\u{201A}'), Some('\u{0453}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{20AC}'), Some('\u{2030}'), Some('\u{0409}'), Some('\u{2039}'),
    Some('\u{040A}'), Some('\u{040C}'), Some('\u{040B}'), Some('\u{040F}'),
    Some('\u{0452}'), Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    None, Some('\u{2122}'), Some('\u{0459}'), Some('\u{203A}'),
    Some('\u{045A}'), Some('\u{045C}'), Some('\u{045B}'), Some('\u{045F}'),
    Some('\u{00A0}'), Some('\u{040E}'), Some('\u{045E}'), Some('\u{0408}'),
    Some('\u{00A4}'), Some('\u{0490}'), Some('\u{00A6}'), Some('\u{00A7}'),
    Some('\u{0401}'), Some('\u{00A9}'), Some('\u{0404}'), Some('\u{00AB}'),
    Some('\u{00AC}'), Some('\u{00AD}'), Some('\u{00AE}'), Some('\u{0407}'),
    Some('\u{00B0}'), Some('\u{00B1}'), Some('\u{0406}'), Some('\u{0456}'),
    Some('\u{0491}'), Some('\u{00B5}'), Some('\u{00B6}'), Some('\u{00B7}'),
    Some('\u{0451}'), Some('\u{2116}'), Some('\u{0454}'), Some('\u{00BB}'),
    Some('\u{0458}'), Some('\u{0405}'), Some('\u{0455}'), Some('\u{0457}'),
];

fn cp1251_char(byte: u8) -> Option<char> {
    match byte {
        0x00..=0x7F => Some(char::from(byte)),
        0x80..=0xBF => CP1251_HIGH[usize::from(byte - 0x80)],
        0xC0..=0xFF => char::from_u32(0x0410 + u32::from(byte - 0xC0)),
    }
}

/// Decode a raw body line as UTF-8, falling back to Windows-1251.
///
/// Endpoints with Cyrillic locales write names in the legacy code page.
pub fn decode_line(raw: &[u8]) -> Result<Cow<'_, str>> {
    match std::str::from_utf8(raw) {
        Ok(text) => Ok(Cow::Borrowed(text)),
        Err(utf8) => raw
            .iter()
            .map(|b| cp1251_char(*b))
            .collect::<Option<String>>()
            .map(Cow::Owned)
            .ok_or_else(|| {
                Error::timeline_decoding(
                    String::from_utf8_lossy(raw),
                    format!("neither UTF-8 ({utf8}) nor Windows-1251"),
                )
            }),
    }
}

/// Stats for a single remote filesystem entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineRow {
    pub md5: String,
    pub path: String,
    pub inode: u64,
    pub mode: String,
    pub uid: i64,
    pub gid: i64,
    pub size: u64,
    pub atime: f64,
    pub mtime: f64,
    pub ctime: f64,
    pub crtime: f64,
}

impl TimelineRow {
    /// Parse one decoded line of a timeline body
    pub fn parse(line: &str) -> Result<Self> {
        let fields = split_unescaped_pipes(line);
        if fields.len() != FIELD_COUNT {
            return Err(Error::timeline_decoding(
                line,
                format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
            ));
        }

        let int = |idx: usize| -> Result<i64> {
            fields[idx]
                .trim()
                .parse::<i64>()
                .map_err(|e| Error::timeline_decoding(line, e))
        };
        let unsigned = |idx: usize| -> Result<u64> {
            fields[idx]
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::timeline_decoding(line, e))
        };
        let float = |idx: usize| -> Result<f64> {
            fields[idx]
                .trim()
                .parse::<f64>()
                .map_err(|e| Error::timeline_decoding(line, e))
        };

        // Some collectors emit an empty inode column
        let inode = fields[2].trim().parse::<u64>().unwrap_or_default();

        Ok(Self {
            md5: fields[0].to_string(),
            path: fields[1].to_string(),
            inode,
            mode: fields[3].to_string(),
            uid: int(4)?,
            gid: int(5)?,
            size: unsigned(6)?,
            atime: float(7)?,
            mtime: float(8)?,
            ctime: float(9)?,
            crtime: float(10)?,
        })
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.mode.starts_with('d')
    }
}

/// Split on `|` unless the pipe is escaped with a backslash.
///
/// Escaped pipes stay in the field verbatim, backslash included.
fn split_unescaped_pipes(line: &str) -> Vec<&str> {
    let mut fields = Vec::with_capacity(FIELD_COUNT);
    let mut start = 0;
    let mut prev = None;
    for (idx, ch) in line.char_indices() {
        if ch == '|' && prev != Some('\\') {
            fields.push(&line[start..idx]);
            start = idx + 1;
        }
        prev = Some(ch);
    }
    fields.push(&line[start..]);
    fields
}
