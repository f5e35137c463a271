use reqwest::blocking::Client;
use std::{
    fs,
    fs::File,
    io::{Read, Write},
    path::Path,
    time::Duration,
};
use tracing::info;

use crate::error::{Result, StemError};
use crate::io::progress::emit_download_progress;

pub fn http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60 * 60))
        .build()
        .map_err(|e| StemError::model_load(format!("http client: {e}")))
}

/// Stream a URL into `dest`, staging through a `.part` file so a failed or
/// interrupted transfer never lands at the final path.
pub fn download_to(client: &Client, url: &str, dest: &Path) -> Result<()> {
    let staging = dest.with_extension("part");

    let mut resp = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| StemError::model_load(format!("fetching {url}: {e}")))?;

    let total = resp.content_length().unwrap_or(0);
    info!(url, bytes = total, "downloading model artifact");
    emit_download_progress(0, total);

    let mut file = File::create(&staging)?;
    let mut downloaded: u64 = 0;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = resp
            .read(&mut buf)
            .map_err(|e| StemError::model_load(format!("reading {url}: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        downloaded += n as u64;
        emit_download_progress(downloaded, total);
    }
    file.flush()?;
    drop(file);

    if dest.exists() {
        fs::remove_file(dest).ok();
    }
    fs::rename(&staging, dest)?;

    emit_download_progress(total.max(downloaded), total.max(downloaded));
    Ok(())
}
