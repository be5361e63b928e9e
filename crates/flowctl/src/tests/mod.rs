// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0


use std::io::{Cursor, Write};
use std::sync::Arc;

use remote::testing::{FakeSession, client};
use remote::{
    FlowResult, HashEntry, OsFamily, PathSpec, PathType, RemoteSession, ResultPayload, StatEntry,
};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::{Engine, EngineConfig, Result};

pub(crate) const CLIENT: &str = "C.1000000000000001";

pub(crate) fn session(os: OsFamily) -> Arc<FakeSession> {
    Arc::new(FakeSession::new().with_client(client(CLIENT, "web01.example.com", os), true))
}

/// Connect with monitors that fetch once and then sleep for the whole test
pub(crate) async fn connect(session: &Arc<FakeSession>) -> Result<Engine> {
    let config = EngineConfig {
        monitor_interval_secs: 3600,
        ..EngineConfig::default()
    };
    let session: Arc<dyn RemoteSession> = session.clone();
    Engine::connect(session, CLIENT, config).await
}

/// Id the fake session assigns to the `n`th created flow
pub(crate) fn nth_flow(n: u64) -> String {
    format!("F{n:06X}")
}

/// A results archive for `flow_id` holding `files` under the given mode
pub(crate) fn archive(flow_name: &str, flow_id: &str, mode: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let root = format!("{CLIENT}_flow_{flow_name}_{flow_id}");
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    zip.start_file(format!("{root}/MANIFEST"), options).unwrap();
    zip.write_all(b"manifest").unwrap();
    zip.start_file(format!("{root}/{CLIENT}/client_info.yaml"), options)
        .unwrap();
    zip.write_all(b"os: linux").unwrap();
    for (path, content) in files {
        zip.start_file(format!("{root}/{CLIENT}/fs/{mode}{path}"), options)
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A hash/stat file-finder result for `path`
pub(crate) fn file_result(path: &str) -> FlowResult {
    FlowResult {
        timestamp: 1,
        payload: ResultPayload::FileFinder {
            stat: StatEntry {
                pathspec: PathSpec::new(path, PathType::Os),
                st_mode: 0o100_644,
                st_size: 5,
                ..Default::default()
            },
            hashes: Some(HashEntry {
                md5: vec![0xab, 0xcd],
                ..Default::default()
            }),
        },
    }
}
