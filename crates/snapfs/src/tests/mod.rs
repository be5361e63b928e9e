// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

mod linux;

pub(crate) const LINUX_TIMELINE: &str = "\
# md5|path|inode|mode|uid|gid|size|atime|mtime|ctime|crtime
0|/|2|drwxr-xr-x|0|0|4096|1683360000.0|1683300000.0|1683300000.0|0.0
0|/root|6815745|drwx--S---|0|0|4096|1683360703.224626|1679618652.750104|1679618652.750104|0.0
0|/root/.bashrc|6815746|-rw-------|0|0|571|1644801907.2463605|1618084800.0|1644801907.2463605|0.0
0|/root/.profile|6815747|-rw-r--r--|0|0|161|1644801907.0|1618084800.0|1644801907.0|0.0
0|/root/.cache|6815748|drwx------|0|0|4096|1683360703.0|1679618652.0|1679618652.0|0.0
0|/root/.cache/dconf|6815749|drwx------|0|0|4096|1683360703.0|1679618652.0|1679618652.0|0.0
0|/root/.cache/dconf/user|6815750|-rw-------|0|0|2|1683360703.0|1679618652.0|1679618652.0|0.0
0|/root/.local|6815751|drwxr-xr-x|0|0|4096|1683360703.0|1679618652.0|1679618652.0|0.0
0|/root/.local/share|6815752|drwx------|0|0|4096|1683360703.0|1679618652.0|1679618652.0|0.0
0|/root/.local/share/nano|6815753|-rw-------|0|0|12|1683360703.0|1679618652.0|1679618652.0|0.0
0|/root/directory with spaces|6815754|drwxr-xr-x|0|0|4096|1683360703.0|1679618652.0|1679618652.0|0.0
0|/root/dead.letter|6815755|-rw-------|0|0|1024|1683360703.0|1679618652.0|1679618652.0|0.0
0|/root_file|12|-rw-r--r--|0|0|10|1683360703.0|1679618652.0|1679618652.0|0.0
0|/odd|13|drwxr-xr-x|0|0|4096|1683360703.0|1679618652.0|1679618652.0|0.0
";

pub(crate) const WINDOWS_TIMELINE: &str = r"0|C:\\|5|drwxrwxrwx|0|0|4096|1684122487|1684120499|1684120499|1684120499
0|C:\\$Recycle.Bin|6|drwxrwxrwx|0|0|0|1684122487|1684120499|1684120499|1684120499
0|C:\\$Recycle.Bin\\S-1-5-18|7|drwxrwxrwx|0|0|0|1684122487|1684120499|1684120499|1684120499
0|C:\\$Recycle.Bin\\S-1-5-18\\desktop.ini|8|-rw-rw-rw-|0|0|129|1684122487|1684120499|1684120499|1684120499
0|C:\\Program Files|9|drwxrwxrwx|0|0|0|1684122487|1684120499|1684120499|1684120499
0|C:\\Program Files\\Common Files|10|drwxrwxrwx|0|0|0|1684122487|1684120499|1684120499|1684120499
0|C:\\PerfLogs|11|drwxrwxrwx|0|0|0|1684122487|1684120499|1684120499|1684120499
0|C:\\pagefile.sys|12|-rw-rw-rw-|0|0|1207959552|1684122487|1684120499|1684120499|1684120499
0|C:\\hiberfil.sys|13|-rw-rw-rw-|0|0|858993459|1684122487|1684120499|1684120499|1684120499
";

pub(crate) const WINDOWS_D_DRIVE_TIMELINE: &str = r"0|D:\\|5|drwxrwxrwx|0|0|4096|1684122487|1684120499|1684120499|1684120499
0|D:\\directory|6|drwxrwxrwx|0|0|0|1684122487|1684120499|1684120499|1684120499
0|D:\\directory\\foobar|7|-rw-rw-rw-|0|0|3|1684122487|1684120499|1684120499|1684120499
";

pub(crate) fn names(entries: &[crate::LsEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}
