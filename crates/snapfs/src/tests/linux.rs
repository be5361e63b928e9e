// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::{LINUX_TIMELINE, names};
use crate::*;

fn linux_fs() -> Result<EmulatedFs> {
    EmulatedFs::from_timeline(PathDialect::Posix, LINUX_TIMELINE.as_bytes(), 10)
}

#[test]
fn test_parse_builds_tree() -> Result<()> {
    let fs = linux_fs()?;
    assert!(fs.exists("/root/.bashrc", false));
    assert!(fs.exists("/root/.cache/dconf", true));
    assert_eq!(fs.pwd(), "/");
    assert_eq!(fs.pwd_freshness(), 10);
    Ok(())
}

#[test]
fn test_added_row_is_listed_and_found() -> Result<()> {
    let mut fs = linux_fs()?;
    let row = TimelineRow::parse("0|/root/file|7|-rwx------|6|5|4096|100.0|101.0|102.0|0.0")?;
    fs.add_row(row, 10);

    let listing = fs.list(Some("/root"), SortKey::Name, true)?;
    let file = listing
        .iter()
        .find(|e| e.name == "file")
        .expect("file should be listed");
    assert_eq!(file.size, 4096);
    assert_eq!(file.uid, 6);
    assert_eq!(file.gid, 5);

    assert_eq!(fs.find(Some("/root"), "fil")?, vec!["/root/file".to_string()]);
    Ok(())
}

#[test]
fn test_cd_and_pwd() -> Result<()> {
    let mut fs = linux_fs()?;
    fs.cd("/root/.local")?;
    assert_eq!(fs.pwd(), "/root/.local");

    fs.cd("share/")?;
    assert_eq!(fs.pwd(), "/root/.local/share");

    let err = fs.cd("nano").unwrap_err();
    assert!(matches!(err, Error::IsAFile(ref p) if p == "/root/.local/share/nano"));
    assert_eq!(fs.pwd(), "/root/.local/share");

    fs.cd("../../.cache")?;
    assert_eq!(fs.pwd(), "/root/.cache");

    let err = fs.cd("does not exist").unwrap_err();
    assert!(err.to_string().contains("/does not exist"));
    assert_eq!(fs.pwd(), "/root/.cache");

    fs.cd("../../../../../../../../")?;
    assert_eq!(fs.pwd(), "/");
    Ok(())
}

#[test]
fn test_exists() -> Result<()> {
    let fs = linux_fs()?;
    assert!(fs.exists("/root", false));
    assert!(fs.exists("/root", true));
    assert!(fs.exists("/root/.bashrc", false));
    assert!(!fs.exists("/root/.bashrc", true));
    assert!(!fs.exists("/nonexistent", false));
    assert!(!fs.exists("/nonexistent", true));
    Ok(())
}

#[test]
fn test_resolve_nonexistent() -> Result<()> {
    let fs = linux_fs()?;
    assert!(matches!(fs.resolve("/nonexistent"), Err(Error::InvalidRemotePath(_))));
    assert!(matches!(
        fs.resolve("/root/.bashrc/below"),
        Err(Error::InvalidRemotePath(_))
    ));
    Ok(())
}

#[test]
fn test_list() -> Result<()> {
    let fs = linux_fs()?;

    let root = fs.list(None, SortKey::Name, true)?;
    assert_eq!(names(&root), [".", "odd", "root", "root_file"]);

    let home = fs.list(Some("/root"), SortKey::Name, true)?;
    assert_eq!(
        names(&home),
        [
            ".",
            ".cache",
            ".local",
            "directory with spaces",
            ".bashrc",
            ".profile",
            "dead.letter"
        ]
    );

    let file = fs.list(Some("/root/.bashrc"), SortKey::Name, true)?;
    assert_eq!(names(&file), [".bashrc"]);
    Ok(())
}

#[test]
fn test_list_glob() -> Result<()> {
    let fs = linux_fs()?;
    assert_eq!(
        names(&fs.list(Some("*"), SortKey::Name, true)?),
        [".", "odd", "root", "root_file"]
    );
    assert_eq!(
        names(&fs.list(Some("/ro*"), SortKey::Name, true)?),
        ["root", "root_file"]
    );
    assert_eq!(
        names(&fs.list(Some("/root/*e*"), SortKey::Name, true)?),
        [".cache", "directory with spaces", ".profile", "dead.letter"]
    );
    Ok(())
}

#[test]
fn test_list_glob_not_final() -> Result<()> {
    let fs = linux_fs()?;
    let err = fs
        .list(Some("/tmp/pa*th/x"), SortKey::Name, true)
        .unwrap_err();
    match &err {
        Error::GlobNotFinal { prefix, path } => {
            assert_eq!(prefix, "/tmp/pa*th");
            assert_eq!(path, "/tmp/pa*th/x");
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(
        err.to_string()
            .starts_with("Globbing only supported for the final path component: /tmp/pa*th/x")
    );
    Ok(())
}

#[test]
fn test_list_sorted_by_size_descending() -> Result<()> {
    let fs = linux_fs()?;
    let listing = fs.list(Some("/root"), SortKey::Size, false)?;
    let sizes: Vec<u64> = listing.iter().map(|e| e.size).collect();
    let mut expected = sizes.clone();
    expected.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(sizes, expected);
    Ok(())
}

#[test]
fn test_children() -> Result<()> {
    let fs = linux_fs()?;
    let children = fs.children("/root", false)?;
    assert_eq!(
        children,
        [
            ".bashrc",
            ".cache/",
            ".local/",
            ".profile",
            "dead.letter",
            "directory with spaces/"
        ]
    );
    let dirs = fs.children("/root", true)?;
    assert_eq!(dirs, [".cache/", ".local/", "directory with spaces/"]);

    assert!(matches!(
        fs.children("/nonexistent", false),
        Err(Error::InvalidRemotePath(_))
    ));
    assert!(matches!(
        fs.children("/root/.bashrc", false),
        Err(Error::IsAFile(_))
    ));
    Ok(())
}

#[test]
fn test_find() -> Result<()> {
    let mut fs = linux_fs()?;
    assert_eq!(fs.find(None, "bash")?, ["/root/.bashrc"]);
    assert_eq!(
        fs.find(Some("/"), ".*ca[cd].*")?,
        ["/root/.cache", "/root/.cache/dconf", "/root/.cache/dconf/user"]
    );

    fs.cd("/root")?;
    assert_eq!(fs.find(Some(""), "bash")?, ["/root/.bashrc"]);

    assert!(matches!(
        fs.find(Some("/nonexistent"), "bash"),
        Err(Error::InvalidRemotePath(_))
    ));
    assert!(matches!(
        fs.find(Some("/root/.bashrc"), "bash"),
        Err(Error::IsAFile(_))
    ));
    assert!(matches!(fs.find(None, "("), Err(Error::Regex(_))));
    Ok(())
}

#[test]
fn test_offline_stat() -> Result<()> {
    let fs = linux_fs()?;
    assert_eq!(
        fs.offline_stat("/root/.bashrc"),
        "/root/.bashrc
    mode:   -rw-------
    inode:  6815746
    uid:    0
    gid:    0
    size:   571 (571 Bytes)
    atime:  1644801907.2463605 - 2022-02-14T01:25:07Z
    mtime:  1618084800.0 - 2021-04-10T20:00:00Z
    ctime:  1644801907.2463605 - 2022-02-14T01:25:07Z
    crtime: 0.0 - 1970-01-01T00:00:00Z"
    );
    assert_eq!(
        fs.offline_stat("/root/"),
        "/root
    mode:   drwx--S---
    inode:  6815745
    uid:    0
    gid:    0
    size:   4096 (4.0 KiB)
    atime:  1683360703.224626 - 2023-05-06T08:11:43Z
    mtime:  1679618652.750104 - 2023-03-24T00:44:12Z
    ctime:  1679618652.750104 - 2023-03-24T00:44:12Z
    crtime: 0.0 - 1970-01-01T00:00:00Z"
    );
    assert_eq!(
        fs.offline_stat("/nonexistent"),
        "No such file or directory: /nonexistent"
    );
    Ok(())
}

#[test]
fn test_bad_row_is_rejected() {
    let mut fs = EmulatedFs::new(PathDialect::Posix);
    let err = fs.parse_timeline(b"0|/root|2|drwx------\n", 1).unwrap_err();
    assert!(matches!(err, Error::TimelineDecoding { .. }));
}

#[test]
fn test_cp1251_names_are_decoded() -> Result<()> {
    let mut fs = EmulatedFs::new(PathDialect::Posix);
    // "Отчет" in Windows-1251
    let mut line = b"0|/tmp/".to_vec();
    line.extend_from_slice(&[0xce, 0xf2, 0xf7, 0xe5, 0xf2]);
    line.extend_from_slice(b"|1|-rw-r--r--|0|0|1|0.0|0.0|0.0|0.0\n");
    assert_eq!(fs.parse_timeline(&line, 1)?, 1);
    assert_eq!(fs.children("/tmp", false)?, ["\u{041e}\u{0442}\u{0447}\u{0435}\u{0442}"]);
    assert_eq!(fs.find(Some("/tmp"), "\u{0447}")?, ["/tmp/\u{041e}\u{0442}\u{0447}\u{0435}\u{0442}"]);
    Ok(())
}

#[test]
fn test_undecodable_row_is_rejected() {
    let mut fs = EmulatedFs::new(PathDialect::Posix);
    let err = fs
        .parse_timeline(b"0|/tmp/\x98|1|-rw-r--r--|0|0|1|0.0|0.0|0.0|0.0\n", 1)
        .unwrap_err();
    assert!(matches!(err, Error::TimelineDecoding { .. }));
}

const ODD_NAMES: &str = "\
0|/tmp|2|drwxrwxrwt|0|0|4096|1.0|1.0|1.0|0.0
0|/tmp/report (1).txt|3|-rw-r--r--|0|0|1|1.0|1.0|1.0|0.0
0|/tmp/report (2).txt|4|-rw-r--r--|0|0|1|1.0|1.0|1.0|0.0
0|/tmp/x{y}.log|5|-rw-r--r--|0|0|1|1.0|1.0|1.0|0.0
0|/tmp/a,b<1>.txt|6|-rw-r--r--|0|0|1|1.0|1.0|1.0|0.0
0|/tmp/ab|7|-rw-r--r--|0|0|1|1.0|1.0|1.0|0.0
0|/tmp/$cost:1|8|-rw-r--r--|0|0|1|1.0|1.0|1.0|0.0
0|/tmp/[old]|9|-rw-r--r--|0|0|1|1.0|1.0|1.0|0.0
";

#[test]
fn test_list_glob_matches_names_literally() -> Result<()> {
    let fs = EmulatedFs::from_timeline(PathDialect::Posix, ODD_NAMES.as_bytes(), 1)?;
    let ls = |pattern: &str| -> Result<Vec<String>> {
        Ok(names(&fs.list(Some(pattern), SortKey::Name, true)?)
            .into_iter()
            .map(str::to_string)
            .collect())
    };

    assert_eq!(ls("/tmp/report (1)*")?, ["report (1).txt"]);
    assert_eq!(ls("/tmp/report (?).txt")?, ["report (1).txt", "report (2).txt"]);
    assert_eq!(ls("/tmp/x{y}*")?, ["x{y}.log"]);
    assert_eq!(ls("/tmp/a,b<1>*")?, ["a,b<1>.txt"]);
    assert_eq!(ls("/tmp/a**")?, ["a,b<1>.txt", "ab"]);
    assert_eq!(ls("/tmp/$cost:?")?, ["$cost:1"]);
    assert_eq!(ls("/tmp/[old*")?, ["[old]"]);
    Ok(())
}

#[test]
fn test_shell_glob_translation() {
    use crate::fs::shell_glob;

    assert_eq!(shell_glob("report (1)*"), r"report \(1\)*");
    assert_eq!(shell_glob("x{y},z"), r"x\{y\}\,z");
    assert_eq!(shell_glob("a**b***"), "a*b*");
    assert_eq!(shell_glob("[!ab]?.log"), "[!ab]?.log");
    assert_eq!(shell_glob("[x"), r"\[x");
    assert_eq!(shell_glob("[]"), r"\[\]");
}

#[test]
fn test_list_glob_classes() -> Result<()> {
    let fs = EmulatedFs::from_timeline(PathDialect::Posix, ODD_NAMES.as_bytes(), 1)?;
    assert_eq!(
        names(&fs.list(Some("/tmp/report ([12]).txt"), SortKey::Name, true)?),
        ["report (1).txt", "report (2).txt"]
    );
    assert_eq!(
        names(&fs.list(Some("/tmp/report ([!1]).txt"), SortKey::Name, true)?),
        ["report (2).txt"]
    );
    Ok(())
}
