//! Reference task service command: `taskboard serve`.

use std::path::PathBuf;

use anyhow::Result;

use taskboard::service::{ServerConfig, start_server};

pub async fn cmd_serve(port: u16, db_path: PathBuf, in_memory: bool, dev: bool) -> Result<()> {
    start_server(ServerConfig {
        port,
        db_path,
        in_memory,
        dev_mode: dev,
    })
    .await
}
