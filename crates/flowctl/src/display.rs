// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Text rendering of flow arguments and flow results.

use std::io::{Cursor, Read};

use diagnostics::*;
use futures::TryStreamExt;
use remote::{Flow, FlowArgs, FlowResult, HashEntry, PathSpec, RemoteSession, ResultPayload, StatEntry};
use snapfs::{natural_size, readable_timestamp};

use crate::{FlowctlError, Result};

const UNSUPPORTED_FLOW_TYPE: &str = "<UNSUPPORTED FLOW TYPE>";

fn with_stream(pathspec: &PathSpec) -> String {
    match &pathspec.stream_name {
        Some(stream) if !stream.is_empty() => format!("{}:{stream}", pathspec.path),
        _ => pathspec.path.clone(),
    }
}

/// Summarise a multi-valued argument on one line
fn one_or_many(prefix: &str, values: &[String], many: &str) -> String {
    match values {
        [single] if prefix.is_empty() => single.clone(),
        [single] => format!("{prefix} {single}"),
        _ if prefix.is_empty() => many.to_string(),
        _ => format!("{prefix} {many}"),
    }
}

/// Render flow arguments.
///
/// With `multiline` false the first line is a one-line summary suitable for
/// listings. Undecoded or unknown arguments render a fixed placeholder.
#[must_use]
pub fn flow_args_lines(args: Option<&FlowArgs>, multiline: bool) -> Vec<String> {
    let Some(args) = args else {
        return vec![UNSUPPORTED_FLOW_TYPE.to_string()];
    };
    match args {
        FlowArgs::FileFinder { paths, action, .. } => {
            if multiline {
                std::iter::once(format!("Action: {}", action.as_str()))
                    .chain(paths.iter().map(|p| format!("Path: {p}")))
                    .collect()
            } else {
                vec![one_or_many(action.as_str(), paths, "<MULTIPLE PATHS>")]
            }
        }
        FlowArgs::Timeline { root } => vec![format!("root: {root}")],
        FlowArgs::ArtifactCollector { artifacts, .. } => {
            if multiline {
                artifacts.iter().map(|a| format!("Artefact: {a}")).collect()
            } else {
                vec![one_or_many("", artifacts, "<MULTIPLE ARTEFACTS>")]
            }
        }
        FlowArgs::GetFile { pathspec } => vec![with_stream(pathspec)],
        FlowArgs::MultiGetFile { pathspecs } => {
            let lines: Vec<String> = pathspecs.iter().map(with_stream).collect();
            if multiline || lines.len() == 1 {
                lines
            } else {
                vec!["<MULTIPLE PATHS>".to_string()]
            }
        }
        FlowArgs::CollectFilesByKnownPath {
            paths,
            collection_level,
        } => {
            if multiline {
                std::iter::once(format!("Collection Level: {collection_level}"))
                    .chain(paths.iter().map(|p| format!("Path: {p}")))
                    .collect()
            } else {
                vec![one_or_many(collection_level, paths, "<MULTIPLE PATHS>")]
            }
        }
        FlowArgs::CollectBrowserHistory { browsers } => {
            if multiline {
                browsers.iter().map(|b| format!("Browser: {b}")).collect()
            } else {
                vec![browsers.join(",")]
            }
        }
        FlowArgs::ListDirectory { pathspec } => {
            let pathtype = pathspec.pathtype.as_str();
            if multiline {
                vec![
                    format!("Pathtype: {pathtype}"),
                    format!("Path: {}", pathspec.path),
                ]
            } else {
                vec![format!("{pathtype} - {}", pathspec.path)]
            }
        }
        FlowArgs::Interrogate => vec![String::new()],
        FlowArgs::Unsupported { .. } => vec![UNSUPPORTED_FLOW_TYPE.to_string()],
    }
}

/// `ls -l` style mode string, e.g. `-rw-r--r--`
#[must_use]
pub fn filemode(mode: u32) -> String {
    let kind = match mode & 0o170_000 {
        0o140_000 => 's',
        0o120_000 => 'l',
        0o100_000 => '-',
        0o060_000 => 'b',
        0o040_000 => 'd',
        0o020_000 => 'c',
        0o010_000 => 'p',
        _ => '?',
    };

    // (read, write, execute bit, special bit, special set+exec, special set only)
    let triads = [
        (0o400, 0o200, 0o100, 0o4000, 's', 'S'),
        (0o040, 0o020, 0o010, 0o2000, 's', 'S'),
        (0o004, 0o002, 0o001, 0o1000, 't', 'T'),
    ];

    let mut out = String::with_capacity(10);
    out.push(kind);
    for (r, w, x, special, with_x, without_x) in triads {
        out.push(if mode & r != 0 { 'r' } else { '-' });
        out.push(if mode & w != 0 { 'w' } else { '-' });
        out.push(match (mode & x != 0, mode & special != 0) {
            (true, true) => with_x,
            (false, true) => without_x,
            (true, false) => 'x',
            (false, false) => '-',
        });
    }
    out
}

fn seconds(ts: i64) -> String {
    readable_timestamp(ts as f64)
}

fn format_file_finder(stat: &StatEntry, hashes: Option<&HashEntry>) -> Vec<String> {
    let spec = &stat.pathspec;
    let pathname = match (&spec.mount_point, &spec.nested_path) {
        (Some(mount), Some(nested)) if !mount.is_empty() && !nested.path.is_empty() => {
            format!("{mount}{}", nested.path)
        }
        _ => spec.path.clone(),
    };
    let empty = HashEntry::default();
    let hashes = hashes.unwrap_or(&empty);

    vec![
        pathname,
        format!("    mode:           {}", filemode(stat.st_mode)),
        format!("    inode:          {}", stat.st_ino),
        format!("    dev:            {}", stat.st_dev),
        format!("    st_nlink:       {}", stat.st_nlink),
        format!("    st_uid:         {}", stat.st_uid),
        format!("    st_gid:         {}", stat.st_gid),
        format!("    st_size:        {} ({})", stat.st_size, natural_size(stat.st_size)),
        format!("    st_atime:       {} - {}", stat.st_atime, seconds(stat.st_atime)),
        format!("    st_mtime:       {} - {}", stat.st_mtime, seconds(stat.st_mtime)),
        format!("    st_ctime:       {} - {}", stat.st_ctime, seconds(stat.st_ctime)),
        format!("    st_blocks:      {}", stat.st_blocks),
        format!("    st_blksize:     {}", stat.st_blksize),
        format!("    st_rdev:        {}", stat.st_rdev),
        format!("    st_flags_osx:   {}", stat.st_flags_osx),
        format!("    st_flags_linux: {}", stat.st_flags_linux),
        format!("    md5:            {}", hex::encode(&hashes.md5)),
        format!("    sha1:           {}", hex::encode(&hashes.sha1)),
        format!("    sha256:         {}", hex::encode(&hashes.sha256)),
    ]
}

fn format_registry(stat: &StatEntry) -> Option<Vec<String>> {
    let value = stat.registry.as_ref()?;
    let mut lines = vec![format!(
        "    {} ({})",
        stat.pathspec.path, value.registry_type
    )];
    lines.extend(
        value
            .fields
            .iter()
            .map(|(name, field)| format!("        {name}: {field}")),
    );
    Some(lines)
}

/// Archive member holding the stream a single-file get collected
fn ads_member(flow: &Flow, stat: &StatEntry) -> String {
    let spec = &stat.pathspec;
    let (mode, nested_path, stream) = match &spec.nested_path {
        Some(nested) => (nested.pathtype, nested.path.as_str(), nested.stream_name.as_deref()),
        None => (spec.pathtype, "", spec.stream_name.as_deref()),
    };
    format!(
        "{client}_flow_{name}_{flow_id}/{client}/fs/{mode}{path}{nested_path}:{stream}",
        client = flow.client_id,
        name = flow.name,
        flow_id = flow.flow_id,
        mode = mode.dir_name(),
        path = spec.path,
        stream = stream.unwrap_or_default(),
    )
}

async fn format_ads(session: &dyn RemoteSession, flow: &Flow, stat: &StatEntry) -> Result<Vec<String>> {
    let chunks: Vec<bytes::Bytes> = session
        .files_archive(&flow.client_id, &flow.flow_id)
        .await?
        .try_collect()
        .await?;
    let archive = chunks.concat();
    let member = ads_member(flow, stat);

    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    let mut content = Vec::new();
    match zip.by_name(&member) {
        Ok(mut entry) => _ = entry.read_to_end(&mut content)?,
        Err(zip::result::ZipError::FileNotFound) => {
            debug!("No stream {member} in archive", member: member);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    }

    let text = String::from_utf8_lossy(&content);
    Ok(std::iter::once("    Zone.Identifier:".to_string())
        .chain(text.lines().map(|line| format!("        {line}")))
        .collect())
}

/// Render every result of a finished flow.
///
/// Payload kinds without a renderer are a `Runtime` error.
pub async fn format_flow_results(session: &dyn RemoteSession, flow: &Flow) -> Result<Vec<String>> {
    let results: Vec<FlowResult> = session.list_results(&flow.client_id, &flow.flow_id).await?;
    let mut lines = Vec::new();

    for result in &results {
        match &result.payload {
            ResultPayload::FileFinder { stat, hashes } => {
                lines.extend(format_file_finder(stat, hashes.as_ref()));
            }
            ResultPayload::Stat(stat) => {
                if matches!(flow.args, Some(FlowArgs::GetFile { .. })) {
                    lines.extend(format_ads(session, flow, stat).await?);
                } else if let Some(registry) = format_registry(stat) {
                    lines.extend(registry);
                } else {
                    return Err(FlowctlError::runtime("Unsupported StatEntry type"));
                }
            }
            other => {
                return Err(FlowctlError::runtime(format!(
                    "Unsupported result type for output formatting: {}. Consider raising a bug for support.",
                    other.type_name()
                )));
            }
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote::{FileFinderAction, PathType};

    #[test]
    fn test_filemode() {
        assert_eq!(filemode(0o100_644), "-rw-r--r--");
        assert_eq!(filemode(0o040_755), "drwxr-xr-x");
        assert_eq!(filemode(0o120_777), "lrwxrwxrwx");
        assert_eq!(filemode(0o104_755), "-rwsr-xr-x");
        assert_eq!(filemode(0o041_777), "drwxrwxrwt");
        assert_eq!(filemode(0o102_644), "-rw-r-Sr--");
        assert_eq!(filemode(0), "?---------");
    }

    #[test]
    fn test_file_finder_args() {
        let args = FlowArgs::FileFinder {
            paths: vec!["/etc/passwd".to_string()],
            action: FileFinderAction::Download,
            pathtype: PathType::Os,
            max_size: None,
        };
        assert_eq!(flow_args_lines(Some(&args), false), vec!["DOWNLOAD /etc/passwd"]);
        assert_eq!(
            flow_args_lines(Some(&args), true),
            vec!["Action: DOWNLOAD", "Path: /etc/passwd"]
        );

        let many = FlowArgs::FileFinder {
            paths: vec!["/a".to_string(), "/b".to_string()],
            action: FileFinderAction::Hash,
            pathtype: PathType::Ntfs,
            max_size: Some(10),
        };
        assert_eq!(flow_args_lines(Some(&many), false), vec!["HASH <MULTIPLE PATHS>"]);
    }

    #[test]
    fn test_other_args() {
        let get = FlowArgs::GetFile {
            pathspec: PathSpec::new("C:/x.exe", PathType::Ntfs).with_stream("Zone.Identifier"),
        };
        assert_eq!(flow_args_lines(Some(&get), false), vec!["C:/x.exe:Zone.Identifier"]);

        let artifacts = FlowArgs::ArtifactCollector {
            artifacts: vec!["A".to_string(), "B".to_string()],
            use_raw_filesystem_access: false,
            max_file_size: None,
            apply_parsers: false,
        };
        assert_eq!(flow_args_lines(Some(&artifacts), false), vec!["<MULTIPLE ARTEFACTS>"]);
        assert_eq!(flow_args_lines(Some(&artifacts), true), vec!["Artefact: A", "Artefact: B"]);

        let known = FlowArgs::CollectFilesByKnownPath {
            paths: vec!["/p".to_string()],
            collection_level: "STAT".to_string(),
        };
        assert_eq!(flow_args_lines(Some(&known), false), vec!["STAT /p"]);

        let browsers = FlowArgs::CollectBrowserHistory {
            browsers: vec!["CHROME".to_string(), "FIREFOX".to_string()],
        };
        assert_eq!(flow_args_lines(Some(&browsers), false), vec!["CHROME,FIREFOX"]);

        let listing = FlowArgs::ListDirectory {
            pathspec: PathSpec::new("/tmp", PathType::Tsk),
        };
        assert_eq!(flow_args_lines(Some(&listing), false), vec!["TSK - /tmp"]);

        assert_eq!(
            flow_args_lines(Some(&FlowArgs::Timeline { root: "/".to_string() }), true),
            vec!["root: /"]
        );
        assert_eq!(flow_args_lines(Some(&FlowArgs::Interrogate), false), vec![""]);
        assert_eq!(flow_args_lines(None, false), vec![UNSUPPORTED_FLOW_TYPE]);
    }

    #[test]
    fn test_file_finder_result() {
        let stat = StatEntry {
            pathspec: PathSpec::new("/etc/hosts", PathType::Os),
            st_mode: 0o100_644,
            st_size: 2048,
            st_mtime: 1_700_000_000,
            ..Default::default()
        };
        let hashes = HashEntry {
            md5: vec![0xde, 0xad],
            sha1: vec![0xbe, 0xef],
            sha256: vec![0x01],
        };
        let lines = format_file_finder(&stat, Some(&hashes));
        assert_eq!(lines[0], "/etc/hosts");
        assert_eq!(lines[1], "    mode:           -rw-r--r--");
        assert_eq!(lines[7], "    st_size:        2048 (2.0 KiB)");
        assert_eq!(lines[9], "    st_mtime:       1700000000 - 2023-11-14T22:13:20Z");
        assert_eq!(lines[16], "    md5:            dead");
        assert_eq!(lines[18], "    sha256:         01");
    }

    #[test]
    fn test_mounted_path() {
        let mut spec = PathSpec::new("\\\\?\\Volume{x}", PathType::Os);
        spec.mount_point = Some("D:".to_string());
        spec.nested_path = Some(Box::new(PathSpec::new("/data/f", PathType::Ntfs)));
        let stat = StatEntry {
            pathspec: spec,
            ..Default::default()
        };
        assert_eq!(format_file_finder(&stat, None)[0], "D:/data/f");
    }
}
